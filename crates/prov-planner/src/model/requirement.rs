use std::fmt;

use prov_version::VersionRange;
use serde::{Deserialize, Serialize};

use super::unit::{Unit, IU_NAMESPACE};
use crate::catalog::CapabilityQuery;
use crate::filter::{Filter, PropertyContext};

fn default_min() -> u32 {
    1
}

fn default_max() -> u32 {
    u32::MAX
}

fn default_true() -> bool {
    true
}

fn is_default_min(value: &u32) -> bool {
    *value == default_min()
}

fn is_default_max(value: &u32) -> bool {
    *value == default_max()
}

/// A capability match with cardinality bounds, placed by a unit on the selected set.
///
/// Satisfied when the number of selected units providing a matching capability
/// lies within `[min, max]`. `u32::MAX` as `max` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    namespace: String,
    name: String,
    #[serde(default)]
    range: VersionRange,
    #[serde(default = "default_min", skip_serializing_if = "is_default_min")]
    min: u32,
    #[serde(default = "default_max", skip_serializing_if = "is_default_max")]
    max: u32,
    #[serde(default)]
    optional: bool,
    #[serde(default = "default_true")]
    greedy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
}

impl Requirement {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
            min: default_min(),
            max: default_max(),
            optional: false,
            greedy: true,
            filter: None,
        }
    }

    /// Requirement on another unit's identity capability
    pub fn on_unit(id: impl Into<String>, range: VersionRange) -> Self {
        Self::new(IU_NAMESPACE, id, range)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Only match units that are pulled in by some other path
    pub fn non_greedy(mut self) -> Self {
        self.greedy = false;
        self
    }

    pub fn cardinality(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max != u32::MAX
    }

    /// `min <= max` and the range is not empty
    pub fn is_well_formed(&self) -> bool {
        self.min <= self.max && !self.range.is_empty()
    }

    /// The catalog query answering this requirement
    pub fn query(&self) -> CapabilityQuery {
        CapabilityQuery::new(self.namespace.clone(), self.name.clone(), self.range.clone())
    }

    /// Check whether `unit` provides a capability matching this requirement
    pub fn matches(&self, unit: &Unit) -> bool {
        unit.any_capability(|namespace, name, version| {
            namespace == self.namespace && name == self.name && self.range.contains(version)
        })
    }

    /// Check whether the requirement applies in the given property context
    pub fn is_applicable(&self, context: &PropertyContext) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(context))
    }

    /// Check whether `count` matching units satisfy the cardinality bounds
    pub fn is_satisfied_by(&self, count: usize) -> bool {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        count >= u64::from(self.min) && count <= u64::from(self.max)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.namespace, self.name, self.range)?;
        if self.min != default_min() || self.has_upper_bound() {
            if self.has_upper_bound() {
                write!(f, " {{{}..{}}}", self.min, self.max)?;
            } else {
                write!(f, " {{{}..}}", self.min)?;
            }
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        if !self.greedy {
            write!(f, " (non-greedy)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capability;
    use prov_version::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn test_matches_identity_and_provided() {
        let unit = Unit::new("lib", v("2.1")).provides(Capability::new("java.package", "org.lib", v("2.1")));

        assert!(Requirement::on_unit("lib", r("[2.0,3.0)")).matches(&unit));
        assert!(!Requirement::on_unit("lib", r("[1.0,2.0)")).matches(&unit));
        assert!(Requirement::new("java.package", "org.lib", r("2.0")).matches(&unit));
        assert!(!Requirement::new("java.package", "org.other", r("2.0")).matches(&unit));
        assert!(!Requirement::new("osgi.bundle", "lib", r("2.0")).matches(&unit));
    }

    #[test]
    fn test_cardinality() {
        let req = Requirement::on_unit("x", VersionRange::any()).cardinality(1, 2);
        assert!(!req.is_satisfied_by(0));
        assert!(req.is_satisfied_by(1));
        assert!(req.is_satisfied_by(2));
        assert!(!req.is_satisfied_by(3));
        assert!(!Requirement::on_unit("x", VersionRange::any()).cardinality(2, 1).is_well_formed());
    }

    #[test]
    fn test_defaults_from_json() {
        let req: Requirement = serde_json::from_str(r#"{"namespace": "iu", "name": "a"}"#).unwrap();
        assert_eq!(req.min(), 1);
        assert!(!req.has_upper_bound());
        assert!(req.is_greedy());
        assert!(!req.is_optional());
        assert!(req.range().is_any());
    }

    #[test]
    fn test_display() {
        let req = Requirement::on_unit("x", r("[2.0,3.0)"));
        assert_eq!(req.to_string(), "iu:x [2.0.0,3.0.0)");
        let req = Requirement::on_unit("x", r("1.0")).cardinality(0, 1).optional();
        assert_eq!(req.to_string(), "iu:x 1.0.0 {0..1} (optional)");
    }
}
