use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::projector::EncodedProblem;
use crate::error::{ResolutionError, Result};
use crate::filter::PropertyContext;
use crate::model::{InclusionRule, ProfileChangeRequest, Unit, UnitKey};
use crate::solver::Assignment;

/// Maps a solver assignment back to units and re-checks the model invariants
pub struct SolutionExtractor<'a> {
    problem: &'a EncodedProblem,
    request: &'a ProfileChangeRequest,
    context: &'a PropertyContext,
}

impl<'a> SolutionExtractor<'a> {
    pub fn new(problem: &'a EncodedProblem, request: &'a ProfileChangeRequest, context: &'a PropertyContext) -> Self {
        Self {
            problem,
            request,
            context,
        }
    }

    /// Selected units sorted by (id, version)
    pub fn extract(&self, assignment: &Assignment) -> Result<Vec<Arc<Unit>>> {
        let mut selected: Vec<Arc<Unit>> = self
            .problem
            .allocator
            .units()
            .filter(|(var, _)| assignment.value(*var))
            .map(|(_, unit)| Arc::clone(unit))
            .collect();
        selected.sort_by(|a, b| a.id().cmp(b.id()).then_with(|| a.version().cmp(b.version())));

        if let Err(reason) = self.validate(&selected) {
            log::error!("Solver produced an invalid selection: {}", reason);
            return Err(ResolutionError::InternalInconsistency(reason));
        }
        Ok(selected)
    }

    /// Check a selection against the model invariants
    pub fn validate(&self, selected: &[Arc<Unit>]) -> std::result::Result<(), String> {
        let keys: HashSet<UnitKey> = selected.iter().map(|u| u.key()).collect();

        // At most one version per singleton id
        let mut by_id: IndexMap<&str, Vec<&Arc<Unit>>> = IndexMap::new();
        for unit in selected {
            by_id.entry(unit.id()).or_default().push(unit);
        }
        for (id, units) in &by_id {
            if units.len() > 1 && units.iter().any(|u| u.is_singleton()) {
                return Err(format!("{} versions of singleton {} are selected", units.len(), id));
            }
        }

        // Closure under requirements
        for unit in selected {
            for requirement in unit.requirements() {
                if !requirement.is_applicable(self.context) {
                    continue;
                }
                let count = selected.iter().filter(|u| requirement.matches(u)).count();
                let satisfied = if requirement.is_optional() {
                    !requirement.has_upper_bound() || count <= requirement.max() as usize
                } else {
                    requirement.is_satisfied_by(count)
                };
                if !satisfied {
                    return Err(format!(
                        "{} requires {} but {} matching units are selected",
                        unit, requirement, count
                    ));
                }
            }
        }

        for (unit, rule) in self.request.additions() {
            if rule == InclusionRule::Strict && !keys.contains(&unit.key()) {
                return Err(format!("requested unit {} is not selected", unit));
            }
        }

        for unit in self.request.removals() {
            if keys.contains(&unit.key()) {
                return Err(format!("removed unit {} is still selected", unit));
            }
        }

        Ok(())
    }
}
