//! Version ranges with inclusive/exclusive bounds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionError};

/// One end of a version range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    version: Version,
    is_inclusive: bool,
}

impl Bound {
    /// Create a new bound
    pub fn new(version: Version, is_inclusive: bool) -> Self {
        Bound {
            version,
            is_inclusive,
        }
    }

    pub fn inclusive(version: Version) -> Self {
        Self::new(version, true)
    }

    pub fn exclusive(version: Version) -> Self {
        Self::new(version, false)
    }

    /// Get the bound version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Check if the bound is inclusive
    pub fn is_inclusive(&self) -> bool {
        self.is_inclusive
    }

    /// Check if this is the zero bound (`[0.0.0`)
    pub fn is_zero(&self) -> bool {
        self.version == Version::zero() && self.is_inclusive
    }

    /// Does `version` lie above this bound when used as a lower bound
    fn admits_from_below(&self, version: &Version) -> bool {
        if self.is_inclusive {
            version >= &self.version
        } else {
            version > &self.version
        }
    }

    /// Does `version` lie below this bound when used as an upper bound
    fn admits_from_above(&self, version: &Version) -> bool {
        if self.is_inclusive {
            version <= &self.version
        } else {
            version < &self.version
        }
    }
}

/// A contiguous interval of versions.
///
/// Accepted syntax:
/// - `[1.0,2.0)`, `(1.0,2.0]`, `[1.0,1.0]` - interval notation
/// - `[1.0,)` - no upper bound
/// - `1.0` - shorthand for `[1.0,)`
/// - `*` or the empty string - any version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    min: Bound,
    max: Option<Bound>,
}

impl VersionRange {
    /// The range matching every version
    pub fn any() -> Self {
        Self {
            min: Bound::inclusive(Version::zero()),
            max: None,
        }
    }

    /// The range matching exactly one version
    pub fn exact(version: Version) -> Self {
        Self {
            min: Bound::inclusive(version.clone()),
            max: Some(Bound::inclusive(version)),
        }
    }

    /// `>= version`
    pub fn at_least(version: Version) -> Self {
        Self {
            min: Bound::inclusive(version),
            max: None,
        }
    }

    /// Build a range from explicit bounds, rejecting empty intervals
    pub fn new(min: Bound, max: Option<Bound>) -> Result<Self, VersionError> {
        let range = Self { min, max };
        if range.is_empty() {
            return Err(VersionError::InvalidRange {
                range: range.to_string(),
                reason: "minimum lies above maximum".to_string(),
            });
        }
        Ok(range)
    }

    /// Parse a range string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| VersionError::InvalidRange {
            range: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let first = trimmed.chars().next().unwrap_or(' ');
        if first != '[' && first != '(' {
            let version = Version::parse(trimmed).map_err(|_| invalid("malformed version"))?;
            return Ok(Self::at_least(version));
        }

        let last = trimmed.chars().last().unwrap_or(' ');
        if last != ']' && last != ')' {
            return Err(invalid("missing closing bracket"));
        }

        let body = &trimmed[1..trimmed.len() - 1];
        let (low, high) = body
            .split_once(',')
            .ok_or_else(|| invalid("expected two comma-separated bounds"))?;
        if high.contains(',') {
            return Err(invalid("too many bounds"));
        }

        let low = low.trim();
        let high = high.trim();
        if low.is_empty() {
            return Err(invalid("missing lower bound"));
        }

        let min_version = Version::parse(low).map_err(|_| invalid("malformed lower bound"))?;
        let min = Bound::new(min_version, first == '[');

        let max = if high.is_empty() {
            if last != ')' {
                return Err(invalid("an open upper bound must be exclusive"));
            }
            None
        } else {
            let max_version = Version::parse(high).map_err(|_| invalid("malformed upper bound"))?;
            Some(Bound::new(max_version, last == ']'))
        };

        let range = Self { min, max };
        if range.is_empty() {
            return Err(invalid("the interval is empty"));
        }
        Ok(range)
    }

    pub fn min(&self) -> &Bound {
        &self.min
    }

    pub fn max(&self) -> Option<&Bound> {
        self.max.as_ref()
    }

    /// Check whether a version lies inside this range
    pub fn contains(&self, version: &Version) -> bool {
        if !self.min.admits_from_below(version) {
            return false;
        }
        match &self.max {
            Some(max) => max.admits_from_above(version),
            None => true,
        }
    }

    /// Check whether the range admits every version
    pub fn is_any(&self) -> bool {
        self.min.is_zero() && self.max.is_none()
    }

    /// Check whether no version can satisfy this range
    pub fn is_empty(&self) -> bool {
        let Some(max) = &self.max else {
            return false;
        };
        match self.min.version.cmp(&max.version) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => !(self.min.is_inclusive && max.is_inclusive),
            std::cmp::Ordering::Less => false,
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max {
            None if self.min.is_inclusive => write!(f, "{}", self.min.version),
            None => write!(f, "({},)", self.min.version),
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.min.is_inclusive { '[' } else { '(' },
                self.min.version,
                max.version,
                if max.is_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.to_string()
    }
}
