use std::collections::HashMap;
use std::sync::Arc;

use super::{CapabilityQuery, Catalog};
use crate::filter::PropertyContext;
use crate::model::{Unit, UnitKey, IU_NAMESPACE};

/// Insertion-ordered catalog held in memory.
///
/// Units are indexed by every (namespace, name) they provide, identity
/// capability included, so a query touches only plausible candidates.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    units: Vec<Arc<Unit>>,
    keys: HashMap<UnitKey, usize>,
    by_capability: HashMap<(String, String), Vec<usize>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units<I, U>(units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Arc<Unit>>,
    {
        let mut catalog = Self::new();
        for unit in units {
            catalog.add(unit);
        }
        catalog
    }

    /// Add a unit. Returns false if a unit with the same id and version is
    /// already present; the first one wins.
    pub fn add(&mut self, unit: impl Into<Arc<Unit>>) -> bool {
        let unit = unit.into();
        let key = unit.key();
        if self.keys.contains_key(&key) {
            log::debug!("Ignoring duplicate catalog entry {}", key);
            return false;
        }

        let index = self.units.len();
        self.index(IU_NAMESPACE, unit.id(), index);
        for capability in unit.provided_capabilities() {
            self.index(&capability.namespace, &capability.name, index);
        }

        self.keys.insert(key, index);
        self.units.push(unit);
        true
    }

    fn index(&mut self, namespace: &str, name: &str, index: usize) {
        let slot = self
            .by_capability
            .entry((namespace.to_string(), name.to_string()))
            .or_default();
        // A unit providing the same name twice is indexed once
        if slot.last() != Some(&index) {
            slot.push(index);
        }
    }

    pub fn get(&self, key: &UnitKey) -> Option<&Arc<Unit>> {
        self.keys.get(key).map(|&idx| &self.units[idx])
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn query(&self, query: &CapabilityQuery, context: &PropertyContext) -> Vec<Arc<Unit>> {
        let Some(indices) = self
            .by_capability
            .get(&(query.namespace.clone(), query.name.clone()))
        else {
            return Vec::new();
        };

        indices
            .iter()
            .map(|&idx| &self.units[idx])
            .filter(|unit| query.matches(unit) && unit.is_applicable(context))
            .cloned()
            .collect()
    }

    fn units(&self) -> Vec<Arc<Unit>> {
        self.units.clone()
    }
}

impl<U: Into<Arc<Unit>>> FromIterator<U> for InMemoryCatalog {
    fn from_iter<I: IntoIterator<Item = U>>(iter: I) -> Self {
        Self::from_units(iter)
    }
}
