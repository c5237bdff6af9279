use std::collections::HashSet;
use std::sync::Arc;

use super::{CapabilityQuery, Catalog};
use crate::filter::PropertyContext;
use crate::model::{Unit, UnitKey};

/// Several catalogs chained in priority order.
///
/// Scan order is catalog order, then each catalog's own order. When two
/// catalogs offer the same (id, version), the earlier catalog wins.
#[derive(Default)]
pub struct CompositeCatalog {
    catalogs: Vec<Arc<dyn Catalog>>,
}

impl CompositeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a catalog with lower priority than the ones already added
    pub fn push(&mut self, catalog: Arc<dyn Catalog>) -> &mut Self {
        self.catalogs.push(catalog);
        self
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    fn dedupe(units: impl Iterator<Item = Arc<Unit>>) -> Vec<Arc<Unit>> {
        let mut seen: HashSet<UnitKey> = HashSet::new();
        units.filter(|unit| seen.insert(unit.key())).collect()
    }
}

impl std::fmt::Debug for CompositeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCatalog")
            .field("catalogs", &self.catalogs.len())
            .finish()
    }
}

impl Catalog for CompositeCatalog {
    fn query(&self, query: &CapabilityQuery, context: &PropertyContext) -> Vec<Arc<Unit>> {
        Self::dedupe(self.catalogs.iter().flat_map(|c| c.query(query, context)))
    }

    fn units(&self) -> Vec<Arc<Unit>> {
        Self::dedupe(self.catalogs.iter().flat_map(|c| c.units()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::model::IU_NAMESPACE;
    use prov_version::{Version, VersionRange};

    #[test]
    fn test_priority_and_dedupe() {
        let primary = InMemoryCatalog::from_units(vec![
            Unit::new("a", Version::new(2, 0, 0)).singleton(),
        ]);
        let secondary = InMemoryCatalog::from_units(vec![
            Unit::new("a", Version::new(1, 0, 0)),
            Unit::new("a", Version::new(2, 0, 0)),
        ]);

        let mut composite = CompositeCatalog::new();
        composite.push(Arc::new(primary)).push(Arc::new(secondary));

        let query = CapabilityQuery::new(IU_NAMESPACE, "a", VersionRange::any());
        let found = composite.query(&query, &PropertyContext::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].version(), &Version::new(2, 0, 0));
        assert!(found[0].is_singleton());
        assert_eq!(found[1].version(), &Version::new(1, 0, 0));
        assert_eq!(composite.units().len(), 2);
    }
}
