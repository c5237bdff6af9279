use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::unit::{Unit, UnitKey};

/// How firmly a unit is held in a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InclusionRule {
    /// The unit must stay exactly as specified
    #[default]
    Strict,
    /// The unit may be dropped when nothing needs it
    Optional,
}

impl InclusionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            InclusionRule::Strict => "strict",
            InclusionRule::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone)]
struct ProfileEntry {
    unit: Arc<Unit>,
    rule: InclusionRule,
}

/// An installed set of units plus properties.
///
/// Profiles are snapshots: resolution reads them and never mutates them.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    entries: IndexMap<UnitKey, ProfileEntry>,
    properties: IndexMap<String, String>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an installed unit held with the STRICT rule
    pub fn with_unit(self, unit: impl Into<Arc<Unit>>) -> Self {
        self.with_unit_rule(unit, InclusionRule::Strict)
    }

    pub fn with_unit_rule(mut self, unit: impl Into<Arc<Unit>>, rule: InclusionRule) -> Self {
        let unit = unit.into();
        self.entries.insert(unit.key(), ProfileEntry { unit, rule });
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Installed units in installation order
    pub fn units(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.entries.values().map(|e| &e.unit)
    }

    pub fn get(&self, key: &UnitKey) -> Option<&Arc<Unit>> {
        self.entries.get(key).map(|e| &e.unit)
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inclusion rule of an installed unit; STRICT for unknown units
    pub fn inclusion_rule(&self, key: &UnitKey) -> InclusionRule {
        self.entries.get(key).map(|e| e.rule).unwrap_or_default()
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_version::Version;

    #[test]
    fn test_profile_rules() {
        let a = Unit::new("a", Version::new(1, 0, 0));
        let b = Unit::new("b", Version::new(1, 0, 0));
        let profile = Profile::new()
            .with_unit(a.clone())
            .with_unit_rule(b.clone(), InclusionRule::Optional)
            .with_property("profile.name", "default");

        assert_eq!(profile.len(), 2);
        assert_eq!(profile.inclusion_rule(&a.key()), InclusionRule::Strict);
        assert_eq!(profile.inclusion_rule(&b.key()), InclusionRule::Optional);
        assert_eq!(profile.property("profile.name"), Some("default"));
        let ids: Vec<&str> = profile.units().map(|u| u.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_inclusion_rule_serde() {
        assert_eq!(serde_json::to_string(&InclusionRule::Optional).unwrap(), "\"optional\"");
        let rule: InclusionRule = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(rule, InclusionRule::Strict);
    }
}
