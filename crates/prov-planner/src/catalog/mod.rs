//! Read-only candidate catalogs queried during encoding.

mod composite;
mod memory;

use std::fmt;
use std::sync::Arc;

use prov_version::VersionRange;

use crate::filter::PropertyContext;
use crate::model::Unit;

pub use composite::CompositeCatalog;
pub use memory::InMemoryCatalog;

/// A capability lookup: namespace, name and admissible versions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityQuery {
    pub namespace: String,
    pub name: String,
    pub range: VersionRange,
}

impl CapabilityQuery {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
        }
    }

    /// Check whether `unit` provides a capability answering this query
    pub fn matches(&self, unit: &Unit) -> bool {
        unit.any_capability(|namespace, name, version| {
            namespace == self.namespace && name == self.name && self.range.contains(version)
        })
    }
}

impl fmt::Display for CapabilityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.namespace, self.name, self.range)
    }
}

/// A source of candidate units.
///
/// Implementations must be free of side effects and safe to query from
/// several resolutions at once.
pub trait Catalog: Send + Sync {
    /// Units answering `query` whose filter matches `context`, in scan order
    fn query(&self, query: &CapabilityQuery, context: &PropertyContext) -> Vec<Arc<Unit>>;

    /// Every unit, in scan order
    fn units(&self) -> Vec<Arc<Unit>>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn query(&self, query: &CapabilityQuery, context: &PropertyContext) -> Vec<Arc<Unit>> {
        (**self).query(query, context)
    }

    fn units(&self) -> Vec<Arc<Unit>> {
        (**self).units()
    }
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn query(&self, query: &CapabilityQuery, context: &PropertyContext) -> Vec<Arc<Unit>> {
        (**self).query(query, context)
    }

    fn units(&self) -> Vec<Arc<Unit>> {
        (**self).units()
    }
}
