use std::collections::HashMap;
use std::time::Instant;

use prov_version::Version;

use super::explanation::Explanation;
use super::extractor::SolutionExtractor;
use super::operand::{compute_operands, Operand, Plan};
use super::projector::Projector;
use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::error::{ResolutionError, Result};
use crate::filter::PropertyContext;
use crate::model::{InclusionRule, Profile, ProfileChangeRequest};
use crate::solver::{Budget, SolveOutcome};

/// Computes the operands that move a profile to a state satisfying a
/// change request.
///
/// Every call builds its own variable space, encoding and solver, so one
/// planner can serve concurrent resolutions.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Budget derived from the configured limits
    pub fn default_budget(&self) -> Budget {
        self.config.budget()
    }

    /// Resolve `request` against `profile`, returning the operand list only
    pub fn resolve_operands(
        &self,
        profile: &Profile,
        catalog: &dyn Catalog,
        request: &ProfileChangeRequest,
        context: &PropertyContext,
        budget: &Budget,
    ) -> Result<Vec<Operand>> {
        self.resolve(profile, catalog, request, context, budget)
            .map(Plan::into_operands)
    }

    /// Resolve `request` against `profile`
    pub fn resolve(
        &self,
        profile: &Profile,
        catalog: &dyn Catalog,
        request: &ProfileChangeRequest,
        context: &PropertyContext,
        budget: &Budget,
    ) -> Result<Plan> {
        let start = Instant::now();
        self.validate_request(request, context)?;

        let problem = Projector::new(profile, catalog, request, context).encode(budget.cancellation())?;

        let mut solver = self.config.solver.create(self.config.solver_options());
        problem.load_into(solver.as_mut());
        let outcome = solver.solve(budget);
        let stats = solver.stats();

        let (assignment, optimal) = match outcome {
            SolveOutcome::SatisfiableOptimal(assignment) => (assignment, true),
            SolveOutcome::Satisfiable(assignment) => (assignment, false),
            SolveOutcome::Unsatisfiable(core) => {
                let explanation = Explanation::from_core(&problem, &core);
                log::info!("Request is unsatisfiable:\n{}", explanation);
                return Err(ResolutionError::Unsatisfiable(explanation));
            }
            SolveOutcome::Timeout => {
                log::warn!("Resolution timed out after {} conflicts", stats.conflicts);
                return Err(ResolutionError::Timeout {
                    conflicts: stats.conflicts,
                });
            }
            SolveOutcome::Cancelled => return Err(ResolutionError::Cancelled),
        };

        let selected = SolutionExtractor::new(&problem, request, context).extract(&assignment)?;
        let operands = compute_operands(profile.units(), &selected);

        log::info!(
            "Resolution completed in {:.3} seconds: {} operands, {} units selected{}",
            start.elapsed().as_secs_f64(),
            operands.len(),
            selected.len(),
            if optimal { "" } else { " (not proven optimal)" }
        );
        for operand in &operands {
            log::debug!("  - {}", operand);
        }

        Ok(Plan::new(
            operands,
            selected,
            request.property_edits().clone(),
            request.unit_property_edits().clone(),
            stats,
            optimal,
        ))
    }

    /// Reject requests that contradict themselves before any encoding
    fn validate_request(&self, request: &ProfileChangeRequest, context: &PropertyContext) -> Result<()> {
        let mut singleton_versions: HashMap<&str, &Version> = HashMap::new();

        for (unit, rule) in request.additions() {
            if let Some(requirement) = unit.requirements().iter().find(|r| !r.is_well_formed()) {
                return Err(ResolutionError::InvalidRequest(format!(
                    "{} has a malformed requirement: {}",
                    unit, requirement
                )));
            }

            if rule != InclusionRule::Strict {
                continue;
            }

            if let Some(removed) = request.removals().find(|r| r.id() == unit.id()) {
                return Err(ResolutionError::InvalidRequest(format!(
                    "{} is requested to be both added and removed (removal of {})",
                    unit.id(),
                    removed
                )));
            }

            if !unit.is_applicable(context) {
                return Err(ResolutionError::InvalidRequest(format!(
                    "{} does not apply to the target environment",
                    unit
                )));
            }

            if unit.is_singleton() {
                if let Some(other) = singleton_versions.insert(unit.id(), unit.version()) {
                    if other != unit.version() {
                        return Err(ResolutionError::InvalidRequest(format!(
                            "Only one version of singleton {} can be installed, but {} and {} were requested",
                            unit.id(),
                            other,
                            unit.version()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::filter::Filter;
    use crate::model::{Requirement, Unit};
    use prov_version::VersionRange;
    use std::sync::Arc;

    fn unit(id: &str, version: &str) -> Unit {
        Unit::new(id, Version::parse(version).unwrap())
    }

    fn invalid(request: &ProfileChangeRequest) -> String {
        let planner = Planner::default();
        let catalog = InMemoryCatalog::new();
        match planner.resolve(
            &Profile::new(),
            &catalog,
            request,
            &PropertyContext::new().with("osgi.os", "linux"),
            &Budget::unlimited(),
        ) {
            Err(ResolutionError::InvalidRequest(message)) => message,
            other => panic!("expected an invalid request, got {:?}", other),
        }
    }

    #[test]
    fn test_add_and_remove_same_id() {
        let mut request = ProfileChangeRequest::new();
        request.add(unit("a", "2.0")).remove(unit("a", "1.0"));
        assert!(invalid(&request).contains("both added and removed"));
    }

    #[test]
    fn test_two_singleton_versions() {
        let mut request = ProfileChangeRequest::new();
        request
            .add(unit("widget", "1.0").singleton())
            .add(unit("widget", "2.0").singleton());
        assert!(invalid(&request).contains("singleton widget"));
    }

    #[test]
    fn test_malformed_requirement() {
        let broken = Requirement::on_unit("b", VersionRange::any()).cardinality(3, 1);
        let mut request = ProfileChangeRequest::new();
        request.add(unit("a", "1.0").requires(broken));
        assert!(invalid(&request).contains("malformed requirement"));
    }

    #[test]
    fn test_inapplicable_strict_addition() {
        let mut request = ProfileChangeRequest::new();
        request.add(unit("a", "1.0").with_filter(Filter::equals("osgi.os", "win32")));
        assert!(invalid(&request).contains("target environment"));
    }

    #[test]
    fn test_optional_addition_and_removal_is_allowed() {
        let a1 = Arc::new(unit("a", "1.0"));
        let a2 = Arc::new(unit("a", "2.0"));
        let catalog = InMemoryCatalog::from_units(vec![a1.clone(), a2.clone()]);
        let profile = Profile::new().with_unit(a1.clone());
        let mut request = ProfileChangeRequest::new();
        request.add_optional(a2).remove(a1);

        let plan = Planner::default()
            .resolve(&profile, &catalog, &request, &PropertyContext::new(), &Budget::unlimited())
            .unwrap();
        assert_eq!(plan.operands().len(), 1);
        assert_eq!(plan.operands()[0].to_string(), "Update a 1.0.0 => 2.0.0");
        assert!(plan.is_optimal());
    }
}
