//! Version value type

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for version and range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid version range \"{range}\": {reason}")]
    InvalidRange { range: String, reason: String },
}

lazy_static! {
    // major[.minor[.micro]][(.|-)qualifier], with an optional leading "v"
    static ref VERSION_RE: Regex = Regex::new(
        r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:[.-]([0-9A-Za-z_-]+))?$"
    ).unwrap();
}

/// A unit or capability version.
///
/// Ordering compares the numeric segments first and then the qualifier
/// lexically; the empty qualifier sorts lowest, so `1.0.0 < 1.0.0.beta`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u64,
    minor: u64,
    micro: u64,
    qualifier: String,
}

impl Version {
    /// Create a version from its numeric segments
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Attach a qualifier to this version
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// The lowest possible version (`0.0.0`)
    pub fn zero() -> Self {
        Self::default()
    }

    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let caps = VERSION_RE
            .captures(trimmed)
            .ok_or_else(|| VersionError::InvalidVersion(input.to_string()))?;

        let segment = |idx: usize| -> Result<u64, VersionError> {
            match caps.get(idx) {
                Some(m) => m
                    .as_str()
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidVersion(input.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: segment(1)?,
            minor: segment(2)?,
            micro: segment(3)?,
            qualifier: caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn micro(&self) -> u64 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}
