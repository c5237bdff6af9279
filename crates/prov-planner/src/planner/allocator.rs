use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Unit, UnitKey};
use crate::solver::VarId;

#[derive(Debug, Clone)]
enum Slot {
    Unit(Arc<Unit>),
    /// A helper variable with no unit behind it
    Auxiliary,
}

/// Session-scoped mapping between units and solver variables.
///
/// Variables are numbered from 1 in allocation order. Allocating the same
/// unit twice returns the same variable.
#[derive(Debug, Default)]
pub struct VariableAllocator {
    slots: Vec<Slot>,
    index: HashMap<UnitKey, VarId>,
}

impl VariableAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variable for `unit`, allocating one on first sight
    pub fn allocate(&mut self, unit: &Arc<Unit>) -> VarId {
        self.allocate_new(unit).0
    }

    /// Like `allocate`, also reporting whether the variable is new
    pub fn allocate_new(&mut self, unit: &Arc<Unit>) -> (VarId, bool) {
        let key = unit.key();
        if let Some(&var) = self.index.get(&key) {
            return (var, false);
        }
        self.slots.push(Slot::Unit(Arc::clone(unit)));
        let var = self.slots.len() as VarId;
        self.index.insert(key, var);
        (var, true)
    }

    /// A fresh variable not tied to any unit
    pub fn allocate_auxiliary(&mut self) -> VarId {
        self.slots.push(Slot::Auxiliary);
        self.slots.len() as VarId
    }

    pub fn var_of(&self, key: &UnitKey) -> Option<VarId> {
        self.index.get(key).copied()
    }

    /// The unit behind a variable, `None` for auxiliary or unknown variables
    pub fn unit(&self, var: VarId) -> Option<&Arc<Unit>> {
        let idx = usize::try_from(var).ok()?.checked_sub(1)?;
        match self.slots.get(idx)? {
            Slot::Unit(unit) => Some(unit),
            Slot::Auxiliary => None,
        }
    }

    /// Unit variables in allocation order
    pub fn units(&self) -> impl Iterator<Item = (VarId, &Arc<Unit>)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| match slot {
            Slot::Unit(unit) => Some(((idx + 1) as VarId, unit)),
            Slot::Auxiliary => None,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.slots.len()
    }

    pub fn num_units(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_version::Version;

    #[test]
    fn test_allocation_is_idempotent() {
        let mut allocator = VariableAllocator::new();
        let a = Arc::new(Unit::new("a", Version::new(1, 0, 0)));
        let b = Arc::new(Unit::new("b", Version::new(1, 0, 0)));

        assert_eq!(allocator.allocate_new(&a), (1, true));
        assert_eq!(allocator.allocate_new(&b), (2, true));
        assert_eq!(allocator.allocate_new(&a), (1, false));
        // A structurally equal unit maps to the same variable
        assert_eq!(allocator.allocate(&Arc::new(Unit::new("a", Version::new(1, 0, 0)))), 1);
        assert_eq!(allocator.num_units(), 2);
    }

    #[test]
    fn test_auxiliary_variables() {
        let mut allocator = VariableAllocator::new();
        let a = Arc::new(Unit::new("a", Version::new(1, 0, 0)));
        allocator.allocate(&a);
        let aux = allocator.allocate_auxiliary();
        assert_eq!(aux, 2);
        assert!(allocator.unit(aux).is_none());
        assert_eq!(allocator.unit(1).map(|u| u.id()), Some("a"));
        assert_eq!(allocator.num_vars(), 2);
        assert_eq!(allocator.units().count(), 1);
        assert!(allocator.unit(0).is_none());
        assert!(allocator.unit(9).is_none());
    }
}
