use std::fmt;

use indexmap::IndexMap;
use prov_version::Version;
use serde::{Deserialize, Serialize};

use super::requirement::Requirement;
use crate::filter::{Filter, PropertyContext};

/// Namespace of the identity capability every unit provides implicitly
pub const IU_NAMESPACE: &str = "iu";

/// A (namespace, name, version) tuple provided by a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
}

impl Capability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.namespace, self.name, self.version)
    }
}

/// Identity of a unit: id plus version.
///
/// Ordered by id first, then version, which is the total order used for
/// every deterministic sort in the planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub id: String,
    pub version: Version,
}

impl UnitKey {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An installable unit.
///
/// Units are immutable once built; the builder methods consume `self` and are
/// meant for constructing catalog entries and test fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: String,
    version: Version,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requirements: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "is_false")]
    singleton: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    touchpoints: IndexMap<String, String>,
}

impl Unit {
    /// Create a new unit with no capabilities or requirements
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            capabilities: Vec::new(),
            requirements: Vec::new(),
            singleton: false,
            filter: None,
            touchpoints: IndexMap::new(),
        }
    }

    /// Mark the unit as singleton
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Declare a provided capability
    pub fn provides(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Declare a requirement
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Attach opaque touchpoint data, passed through to the plan untouched
    pub fn with_touchpoint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.touchpoints.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.id.clone(), self.version.clone())
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Capabilities declared explicitly, without the identity capability
    pub fn provided_capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn touchpoints(&self) -> &IndexMap<String, String> {
        &self.touchpoints
    }

    /// The implicit `iu` capability named after the unit
    pub fn identity_capability(&self) -> Capability {
        Capability::new(IU_NAMESPACE, self.id.clone(), self.version.clone())
    }

    /// All capabilities, identity first
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut all = Vec::with_capacity(self.capabilities.len() + 1);
        all.push(self.identity_capability());
        all.extend(self.capabilities.iter().cloned());
        all
    }

    /// Check whether the unit applies in the given property context
    pub fn is_applicable(&self, context: &PropertyContext) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(context))
    }

    /// Check whether any capability (identity included) satisfies the predicate
    pub(crate) fn any_capability(&self, mut predicate: impl FnMut(&str, &str, &Version) -> bool) -> bool {
        predicate(IU_NAMESPACE, &self.id, &self.version)
            || self
                .capabilities
                .iter()
                .any(|c| predicate(&c.namespace, &c.name, &c.version))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_identity_capability_first() {
        let unit = Unit::new("org.example.core", v("1.0"))
            .provides(Capability::new("java.package", "org.example", v("1.0")));
        let caps = unit.capabilities();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].namespace, IU_NAMESPACE);
        assert_eq!(caps[0].name, "org.example.core");
        assert_eq!(caps[1].namespace, "java.package");
    }

    #[test]
    fn test_key_ordering() {
        let a1 = UnitKey::new("a", v("1.0"));
        let a2 = UnitKey::new("a", v("2.0"));
        let b1 = UnitKey::new("b", v("0.1"));
        let mut keys = vec![b1.clone(), a2.clone(), a1.clone()];
        keys.sort();
        assert_eq!(keys, vec![a1, a2, b1]);
    }

    #[test]
    fn test_applicability() {
        let unit = Unit::new("gtk.fragment", v("1.0")).with_filter(Filter::equals("osgi.ws", "gtk"));
        assert!(unit.is_applicable(&PropertyContext::new().with("osgi.ws", "gtk")));
        assert!(!unit.is_applicable(&PropertyContext::new().with("osgi.ws", "win32")));
        assert!(Unit::new("plain", v("1.0")).is_applicable(&PropertyContext::new()));
    }

    #[test]
    fn test_deserialize_from_json() {
        let unit: Unit = serde_json::from_str(
            r#"{
                "id": "widget",
                "version": "2.0",
                "singleton": true,
                "requirements": [
                    {"namespace": "iu", "name": "base", "range": "[1.0,2.0)"}
                ],
                "filter": "(osgi.os=linux)",
                "touchpoints": {"install": "copy"}
            }"#,
        )
        .unwrap();
        assert_eq!(unit.key(), UnitKey::new("widget", v("2.0")));
        assert!(unit.is_singleton());
        assert_eq!(unit.requirements().len(), 1);
        assert_eq!(unit.touchpoints().get("install").map(String::as_str), Some("copy"));
        assert!(unit.filter().is_some());
    }
}
