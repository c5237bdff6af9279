use std::sync::Arc;

use indexmap::IndexMap;

use super::profile::InclusionRule;
use super::unit::{Unit, UnitKey};

/// A set of changes to apply to a profile.
///
/// Additions and removals keep insertion order; the planner relies on it for
/// deterministic encoding.
#[derive(Debug, Clone, Default)]
pub struct ProfileChangeRequest {
    additions: IndexMap<UnitKey, (Arc<Unit>, InclusionRule)>,
    removals: IndexMap<UnitKey, Arc<Unit>>,
    rule_changes: IndexMap<UnitKey, InclusionRule>,
    /// `None` removes the property
    property_edits: IndexMap<String, Option<String>>,
    unit_property_edits: IndexMap<UnitKey, IndexMap<String, Option<String>>>,
}

impl ProfileChangeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit with the STRICT rule
    pub fn add(&mut self, unit: impl Into<Arc<Unit>>) -> &mut Self {
        self.add_with_rule(unit, InclusionRule::Strict)
    }

    /// Add a unit that may be left out if it cannot be installed
    pub fn add_optional(&mut self, unit: impl Into<Arc<Unit>>) -> &mut Self {
        self.add_with_rule(unit, InclusionRule::Optional)
    }

    pub fn add_with_rule(&mut self, unit: impl Into<Arc<Unit>>, rule: InclusionRule) -> &mut Self {
        let unit = unit.into();
        self.additions.insert(unit.key(), (unit, rule));
        self
    }

    pub fn remove(&mut self, unit: impl Into<Arc<Unit>>) -> &mut Self {
        let unit = unit.into();
        self.removals.insert(unit.key(), unit);
        self
    }

    /// Change how an installed unit is held
    pub fn set_inclusion_rule(&mut self, key: UnitKey, rule: InclusionRule) -> &mut Self {
        self.rule_changes.insert(key, rule);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.property_edits.insert(key.into(), Some(value.into()));
        self
    }

    pub fn remove_property(&mut self, key: impl Into<String>) -> &mut Self {
        self.property_edits.insert(key.into(), None);
        self
    }

    pub fn set_unit_property(
        &mut self,
        unit: UnitKey,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.unit_property_edits
            .entry(unit)
            .or_default()
            .insert(key.into(), Some(value.into()));
        self
    }

    pub fn remove_unit_property(&mut self, unit: UnitKey, key: impl Into<String>) -> &mut Self {
        self.unit_property_edits.entry(unit).or_default().insert(key.into(), None);
        self
    }

    /// Requested additions with their inclusion rule
    pub fn additions(&self) -> impl Iterator<Item = (&Arc<Unit>, InclusionRule)> {
        self.additions.values().map(|(unit, rule)| (unit, *rule))
    }

    pub fn removals(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.removals.values()
    }

    pub fn is_added(&self, key: &UnitKey) -> bool {
        self.additions.contains_key(key)
    }

    pub fn is_removed(&self, key: &UnitKey) -> bool {
        self.removals.contains_key(key)
    }

    /// Rule requested for `key`, if the request changes it
    pub fn rule_change(&self, key: &UnitKey) -> Option<InclusionRule> {
        self.rule_changes.get(key).copied()
    }

    pub fn rule_changes(&self) -> &IndexMap<UnitKey, InclusionRule> {
        &self.rule_changes
    }

    pub fn property_edits(&self) -> &IndexMap<String, Option<String>> {
        &self.property_edits
    }

    pub fn unit_property_edits(&self) -> &IndexMap<UnitKey, IndexMap<String, Option<String>>> {
        &self.unit_property_edits
    }

    /// True when the request changes nothing in the constraint problem
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.rule_changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_version::Version;

    #[test]
    fn test_request_chaining() {
        let a = Unit::new("a", Version::new(1, 0, 0));
        let b = Unit::new("b", Version::new(2, 0, 0));

        let mut request = ProfileChangeRequest::new();
        request
            .add(a.clone())
            .add_optional(b.clone())
            .set_property("p", "1")
            .remove_property("q")
            .set_unit_property(a.key(), "k", "v");

        let additions: Vec<(&str, InclusionRule)> = request.additions().map(|(u, r)| (u.id(), r)).collect();
        assert_eq!(
            additions,
            vec![("a", InclusionRule::Strict), ("b", InclusionRule::Optional)]
        );
        assert!(request.is_added(&a.key()));
        assert_eq!(request.property_edits().get("q"), Some(&None));
        assert!(!request.is_empty());
    }

    #[test]
    fn test_property_only_request_is_empty() {
        let mut request = ProfileChangeRequest::new();
        request.set_property("p", "1");
        assert!(request.is_empty());
    }
}
