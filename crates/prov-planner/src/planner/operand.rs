use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::{Unit, UnitKey};
use crate::solver::SolverStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Install,
    Uninstall,
    Update,
}

/// One unit's change between the current profile and the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    before: Option<Arc<Unit>>,
    after: Option<Arc<Unit>>,
}

impl Operand {
    pub fn install(unit: Arc<Unit>) -> Self {
        Self {
            before: None,
            after: Some(unit),
        }
    }

    pub fn uninstall(unit: Arc<Unit>) -> Self {
        Self {
            before: Some(unit),
            after: None,
        }
    }

    pub fn update(from: Arc<Unit>, to: Arc<Unit>) -> Self {
        Self {
            before: Some(from),
            after: Some(to),
        }
    }

    pub fn before(&self) -> Option<&Arc<Unit>> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Arc<Unit>> {
        self.after.as_ref()
    }

    pub fn kind(&self) -> OperandKind {
        match (&self.before, &self.after) {
            (None, _) => OperandKind::Install,
            (Some(_), None) => OperandKind::Uninstall,
            (Some(_), Some(_)) => OperandKind::Update,
        }
    }

    /// Id of the unit this operand changes
    pub fn id(&self) -> &str {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|u| u.id())
            .unwrap_or_default()
    }

    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.id()
            .cmp(other.id())
            .then_with(|| self.before.as_ref().map(|u| u.version()).cmp(&other.before.as_ref().map(|u| u.version())))
            .then_with(|| self.after.as_ref().map(|u| u.version()).cmp(&other.after.as_ref().map(|u| u.version())))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.before, &self.after) {
            (None, Some(after)) => write!(f, "Install {}", after),
            (Some(before), None) => write!(f, "Uninstall {}", before),
            (Some(before), Some(after)) => write!(f, "Update {} {} => {}", before.id(), before.version(), after.version()),
            (None, None) => write!(f, "Nothing"),
        }
    }
}

/// Diff the installed units against the selected ones.
///
/// Per id, removed and added versions are paired in ascending order into
/// updates; leftovers become uninstalls or installs. The result is sorted by
/// id, then versions.
pub fn compute_operands<'a, I>(installed: I, selected: &[Arc<Unit>]) -> Vec<Operand>
where
    I: IntoIterator<Item = &'a Arc<Unit>>,
{
    let installed: Vec<&Arc<Unit>> = installed.into_iter().collect();
    let installed_keys: HashSet<UnitKey> = installed.iter().map(|u| u.key()).collect();
    let selected_keys: HashSet<UnitKey> = selected.iter().map(|u| u.key()).collect();

    let mut changes: IndexMap<&str, (Vec<Arc<Unit>>, Vec<Arc<Unit>>)> = IndexMap::new();
    for unit in &installed {
        if !selected_keys.contains(&unit.key()) {
            changes.entry(unit.id()).or_default().0.push(Arc::clone(unit));
        }
    }
    for unit in selected {
        if !installed_keys.contains(&unit.key()) {
            changes.entry(unit.id()).or_default().1.push(Arc::clone(unit));
        }
    }

    let mut operands = Vec::new();
    for (_, (mut removed, mut added)) in changes {
        removed.sort_by(|a, b| a.version().cmp(b.version()));
        added.sort_by(|a, b| a.version().cmp(b.version()));

        let paired = removed.len().min(added.len());
        let extra_removed = removed.split_off(paired);
        let extra_added = added.split_off(paired);

        operands.extend(removed.into_iter().zip(added).map(|(from, to)| Operand::update(from, to)));
        operands.extend(extra_removed.into_iter().map(Operand::uninstall));
        operands.extend(extra_added.into_iter().map(Operand::install));
    }

    operands.sort_by(Operand::sort_cmp);
    operands
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    operands: Vec<Operand>,
    selected: Vec<Arc<Unit>>,
    property_edits: IndexMap<String, Option<String>>,
    unit_property_edits: IndexMap<UnitKey, IndexMap<String, Option<String>>>,
    stats: SolverStats,
    optimal: bool,
}

impl Plan {
    pub(crate) fn new(
        operands: Vec<Operand>,
        selected: Vec<Arc<Unit>>,
        property_edits: IndexMap<String, Option<String>>,
        unit_property_edits: IndexMap<UnitKey, IndexMap<String, Option<String>>>,
        stats: SolverStats,
        optimal: bool,
    ) -> Self {
        Self {
            operands,
            selected,
            property_edits,
            unit_property_edits,
            stats,
            optimal,
        }
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn into_operands(self) -> Vec<Operand> {
        self.operands
    }

    /// The full target set of units, sorted by (id, version)
    pub fn selected(&self) -> &[Arc<Unit>] {
        &self.selected
    }

    /// Profile property edits from the request; `None` removes the property
    pub fn property_edits(&self) -> &IndexMap<String, Option<String>> {
        &self.property_edits
    }

    pub fn unit_property_edits(&self) -> &IndexMap<UnitKey, IndexMap<String, Option<String>>> {
        &self.unit_property_edits
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Whether the solver proved this plan optimal
    pub fn is_optimal(&self) -> bool {
        self.optimal
    }

    /// True when no unit changes
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_version::Version;

    fn unit(id: &str, major: u64) -> Arc<Unit> {
        Arc::new(Unit::new(id, Version::new(major, 0, 0)))
    }

    #[test]
    fn test_install_update_uninstall() {
        let installed = vec![unit("foo", 1), unit("bar", 1), unit("keep", 1)];
        let selected = vec![unit("baz", 1), unit("foo", 2), unit("keep", 1)];

        let operands = compute_operands(&installed, &selected);
        let rendered: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["Uninstall bar 1.0.0", "Install baz 1.0.0", "Update foo 1.0.0 => 2.0.0"]
        );
        assert_eq!(operands[0].kind(), OperandKind::Uninstall);
        assert_eq!(operands[1].kind(), OperandKind::Install);
        assert_eq!(operands[2].kind(), OperandKind::Update);
        assert_eq!(operands[2].id(), "foo");
    }

    #[test]
    fn test_multiple_versions_pair_in_order() {
        let installed = vec![unit("lib", 1), unit("lib", 2)];
        let selected = vec![unit("lib", 3)];
        let operands = compute_operands(&installed, &selected);
        assert_eq!(operands.len(), 2);
        // 1 -> 3 update, 2 uninstalled
        assert_eq!(operands[0].kind(), OperandKind::Update);
        assert_eq!(operands[0].before().unwrap().version(), &Version::new(1, 0, 0));
        assert_eq!(operands[1].kind(), OperandKind::Uninstall);
    }

    #[test]
    fn test_no_changes() {
        let installed = vec![unit("a", 1)];
        assert!(compute_operands(&installed, &installed.clone()).is_empty());
    }
}
