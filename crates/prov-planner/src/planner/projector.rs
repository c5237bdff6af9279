//! Encoding of a change request into a pseudo-boolean problem.
//!
//! The variable space starts from the installed units and the units named by
//! the request, then grows along greedy requirements until no new unit is
//! reachable. Units whose filter rejects the property context never enter it.
//!
//! Objective weights are layered so that a higher tier always outweighs the
//! whole tier below it:
//!
//! 1. preservation: dropping an installed OPTIONAL unit or an OPTIONAL addition
//! 2. optional greedy requirements left unmet
//! 3. version preference: each unit costs its rank among the versions of its id
//!    (newest costs 1), which also keeps unneeded units out of the plan

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use super::allocator::VariableAllocator;
use crate::catalog::{CapabilityQuery, Catalog};
use crate::error::{ResolutionError, Result};
use crate::filter::PropertyContext;
use crate::model::{InclusionRule, Profile, ProfileChangeRequest, Unit};
use crate::solver::{CancellationToken, Constraint, ConstraintId, Literal, PseudoBooleanSolver, VarId};

/// Why a hard constraint exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Requirement `requirement` (index into the unit's requirements) of `unit`
    Requirement {
        unit: VarId,
        requirement: usize,
        candidates: Vec<VarId>,
    },
    /// Minimum of an optional greedy requirement, relaxed through an auxiliary
    /// variable
    OptionalRequirement {
        unit: VarId,
        requirement: usize,
        candidates: Vec<VarId>,
    },
    /// At most one version of a singleton id
    Singleton { id: String, units: Vec<VarId> },
    StrictAddition { unit: VarId },
    Installed { unit: VarId },
    Removal { unit: VarId },
}

/// The encoded problem, ready to load into a solver
#[derive(Debug)]
pub struct EncodedProblem {
    pub allocator: VariableAllocator,
    pub constraints: Vec<(Constraint, ConstraintOrigin)>,
    pub objective: Vec<(Literal, u64)>,
}

impl EncodedProblem {
    /// Load variables, constraints and objective into `solver`.
    ///
    /// Constraint ids assigned by the solver equal the indices in
    /// `constraints`.
    pub fn load_into(&self, solver: &mut dyn PseudoBooleanSolver) {
        while solver.num_vars() < self.allocator.num_vars() {
            solver.new_var();
        }
        for (constraint, _) in &self.constraints {
            solver.add_constraint(constraint.clone());
        }
        for &(literal, weight) in &self.objective {
            solver.add_objective_term(literal, weight);
        }
    }

    pub fn origin(&self, id: ConstraintId) -> Option<&ConstraintOrigin> {
        self.constraints.get(id as usize).map(|(_, origin)| origin)
    }
}

/// Builds an [`EncodedProblem`] from a profile, a catalog and a request
pub struct Projector<'a> {
    profile: &'a Profile,
    catalog: &'a dyn Catalog,
    request: &'a ProfileChangeRequest,
    context: &'a PropertyContext,
}

/// Working state of one encoding run
struct Encoding {
    allocator: VariableAllocator,
    constraints: Vec<(Constraint, ConstraintOrigin)>,
    objective: Vec<(Literal, u64)>,
}

impl Encoding {
    fn push(&mut self, constraint: Constraint, origin: ConstraintOrigin) {
        if constraint.is_tautology() {
            return;
        }
        self.constraints.push((constraint, origin));
    }
}

impl<'a> Projector<'a> {
    pub fn new(
        profile: &'a Profile,
        catalog: &'a dyn Catalog,
        request: &'a ProfileChangeRequest,
        context: &'a PropertyContext,
    ) -> Self {
        Self {
            profile,
            catalog,
            request,
            context,
        }
    }

    pub fn encode(&self, cancellation: &CancellationToken) -> Result<EncodedProblem> {
        let start = Instant::now();
        let mut encoding = Encoding {
            allocator: VariableAllocator::new(),
            constraints: Vec::new(),
            objective: Vec::new(),
        };

        self.build_slice(&mut encoding.allocator, cancellation)?;
        log::debug!(
            "Slice contains {} units after {:.3} seconds",
            encoding.allocator.num_units(),
            start.elapsed().as_secs_f64()
        );

        let units: Vec<(VarId, Arc<Unit>)> = encoding
            .allocator
            .units()
            .map(|(var, unit)| (var, Arc::clone(unit)))
            .collect();

        let missed = self.encode_requirements(&mut encoding, &units, cancellation)?;
        let requirement_count = encoding.constraints.len();

        self.encode_singletons(&mut encoding, &units);
        let singleton_count = encoding.constraints.len() - requirement_count;

        let preserved = self.encode_forcing(&mut encoding);
        let forcing_count = encoding.constraints.len() - requirement_count - singleton_count;

        self.encode_objective(&mut encoding, &units, &missed, &preserved);

        log::debug!(
            "Encoded {} requirement, {} singleton and {} forcing constraints, {} objective terms",
            requirement_count,
            singleton_count,
            forcing_count,
            encoding.objective.len()
        );
        log::info!(
            "Encoding completed in {:.3} seconds: {} variables, {} constraints",
            start.elapsed().as_secs_f64(),
            encoding.allocator.num_vars(),
            encoding.constraints.len()
        );

        Ok(EncodedProblem {
            allocator: encoding.allocator,
            constraints: encoding.constraints,
            objective: encoding.objective,
        })
    }

    /// Seed the variable space and expand it along greedy requirements
    fn build_slice(&self, allocator: &mut VariableAllocator, cancellation: &CancellationToken) -> Result<()> {
        let mut worklist: VecDeque<Arc<Unit>> = VecDeque::new();
        let mut seed = |unit: &Arc<Unit>, allocator: &mut VariableAllocator| {
            if !unit.is_applicable(self.context) {
                log::debug!("Skipping {}: filter does not match the context", unit);
                return;
            }
            if allocator.allocate_new(unit).1 {
                worklist.push_back(Arc::clone(unit));
            }
        };

        for unit in self.profile.units() {
            seed(unit, allocator);
        }
        for (unit, _) in self.request.additions() {
            seed(unit, allocator);
        }
        for unit in self.request.removals() {
            seed(unit, allocator);
        }

        let mut cache: HashMap<CapabilityQuery, Vec<Arc<Unit>>> = HashMap::new();
        while let Some(unit) = worklist.pop_front() {
            if cancellation.is_cancelled() {
                log::debug!("Encoding cancelled");
                return Err(ResolutionError::Cancelled);
            }

            for requirement in unit.requirements() {
                if !requirement.is_greedy() || !requirement.is_applicable(self.context) {
                    continue;
                }
                let query = requirement.query();
                let candidates = cache
                    .entry(query)
                    .or_insert_with_key(|query| self.catalog.query(query, self.context));
                for candidate in candidates.iter() {
                    if !candidate.is_applicable(self.context) {
                        continue;
                    }
                    if allocator.allocate_new(candidate).1 {
                        worklist.push_back(Arc::clone(candidate));
                    }
                }
            }
        }
        Ok(())
    }

    /// Emit requirement constraints; returns the auxiliary "missed" variables
    /// of optional greedy requirements
    fn encode_requirements(
        &self,
        encoding: &mut Encoding,
        units: &[(VarId, Arc<Unit>)],
        cancellation: &CancellationToken,
    ) -> Result<Vec<VarId>> {
        let mut missed = Vec::new();

        for (var, unit) in units {
            if cancellation.is_cancelled() {
                return Err(ResolutionError::Cancelled);
            }

            for (idx, requirement) in unit.requirements().iter().enumerate() {
                if !requirement.is_applicable(self.context) {
                    continue;
                }

                let candidates: Vec<VarId> = units
                    .iter()
                    .filter(|(_, candidate)| requirement.matches(candidate))
                    .map(|(candidate_var, _)| *candidate_var)
                    .collect();

                if requirement.has_upper_bound() {
                    encoding.push(
                        Constraint::implies_at_most(*var, candidates.iter().copied(), requirement.max()),
                        ConstraintOrigin::Requirement {
                            unit: *var,
                            requirement: idx,
                            candidates: candidates.clone(),
                        },
                    );
                }

                if requirement.min() == 0 {
                    continue;
                }

                if !requirement.is_optional() {
                    if candidates.is_empty() {
                        log::warn!("No candidate satisfies {} required by {}", requirement, unit);
                    }
                    encoding.push(
                        Constraint::implies_at_least(*var, candidates.iter().copied(), requirement.min()),
                        ConstraintOrigin::Requirement {
                            unit: *var,
                            requirement: idx,
                            candidates,
                        },
                    );
                } else if requirement.is_greedy() && !candidates.is_empty() {
                    // min·¬u + min·miss + Σ m ≥ min
                    let miss = encoding.allocator.allocate_auxiliary();
                    let min = i64::from(requirement.min());
                    let terms = [(min, -*var), (min, miss)]
                        .into_iter()
                        .chain(candidates.iter().map(|&c| (1, c)));
                    encoding.push(
                        Constraint::at_least(terms, min),
                        ConstraintOrigin::OptionalRequirement {
                            unit: *var,
                            requirement: idx,
                            candidates,
                        },
                    );
                    missed.push(miss);
                }
            }
        }

        Ok(missed)
    }

    fn encode_singletons(&self, encoding: &mut Encoding, units: &[(VarId, Arc<Unit>)]) {
        let mut by_id: IndexMap<&str, (bool, Vec<VarId>)> = IndexMap::new();
        for (var, unit) in units {
            let entry = by_id.entry(unit.id()).or_insert((false, Vec::new()));
            entry.0 |= unit.is_singleton();
            entry.1.push(*var);
        }

        for (id, (singleton, vars)) in by_id {
            if singleton && vars.len() > 1 {
                encoding.push(
                    Constraint::at_most(vars.iter().copied(), 1),
                    ConstraintOrigin::Singleton {
                        id: id.to_string(),
                        units: vars,
                    },
                );
            }
        }
    }

    /// Force requested and installed units; returns the variables whose
    /// absence is penalized instead
    fn encode_forcing(&self, encoding: &mut Encoding) -> Vec<VarId> {
        let mut preserved = Vec::new();

        for unit in self.request.removals() {
            if let Some(var) = encoding.allocator.var_of(&unit.key()) {
                encoding.push(Constraint::unit(-var), ConstraintOrigin::Removal { unit: var });
            }
        }

        for (unit, rule) in self.request.additions() {
            let Some(var) = encoding.allocator.var_of(&unit.key()) else {
                continue;
            };
            match rule {
                InclusionRule::Strict => {
                    encoding.push(Constraint::unit(var), ConstraintOrigin::StrictAddition { unit: var });
                }
                InclusionRule::Optional => preserved.push(var),
            }
        }

        let added_ids: HashSet<&str> = self.request.additions().map(|(unit, _)| unit.id()).collect();
        let added_singletons: HashSet<&str> = self
            .request
            .additions()
            .filter(|(unit, _)| unit.is_singleton())
            .map(|(unit, _)| unit.id())
            .collect();
        for unit in self.profile.units() {
            let key = unit.key();
            if self.request.is_removed(&key) || self.request.is_added(&key) {
                continue;
            }
            let Some(var) = encoding.allocator.var_of(&key) else {
                continue;
            };
            // Only a singleton clash makes the installed version replaceable
            if added_ids.contains(unit.id()) && (unit.is_singleton() || added_singletons.contains(unit.id())) {
                log::debug!("{} may be replaced by a requested version", unit);
                continue;
            }

            let rule = self
                .request
                .rule_change(&key)
                .unwrap_or_else(|| self.profile.inclusion_rule(&key));
            match rule {
                InclusionRule::Strict => {
                    encoding.push(Constraint::unit(var), ConstraintOrigin::Installed { unit: var });
                }
                InclusionRule::Optional => preserved.push(var),
            }
        }

        preserved
    }

    fn encode_objective(
        &self,
        encoding: &mut Encoding,
        units: &[(VarId, Arc<Unit>)],
        missed: &[VarId],
        preserved: &[VarId],
    ) {
        // Rank versions of each id, newest first
        let mut by_id: IndexMap<&str, Vec<(VarId, &Unit)>> = IndexMap::new();
        for (var, unit) in units {
            by_id.entry(unit.id()).or_default().push((*var, unit.as_ref()));
        }

        let mut version_terms = Vec::with_capacity(units.len());
        let mut version_total: u64 = 0;
        for (_, mut versions) in by_id {
            // Stable sort keeps scan order between equal versions
            versions.sort_by(|a, b| b.1.version().cmp(a.1.version()));
            for (rank, (var, _)) in versions.into_iter().enumerate() {
                let cost = rank as u64 + 1;
                version_total = version_total.saturating_add(cost);
                version_terms.push((var, cost));
            }
        }

        let missed_weight = version_total.saturating_add(1);
        let missed_total = missed_weight.saturating_mul(missed.len() as u64);
        let preserve_weight = version_total.saturating_add(missed_total).saturating_add(1);

        for &var in preserved {
            encoding.objective.push((-var, preserve_weight));
        }
        for &miss in missed {
            encoding.objective.push((miss, missed_weight));
        }
        encoding.objective.extend(version_terms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::model::Requirement;
    use prov_version::{Version, VersionRange};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    fn encode(profile: &Profile, catalog: &InMemoryCatalog, request: &ProfileChangeRequest) -> EncodedProblem {
        Projector::new(profile, catalog, request, &PropertyContext::new())
            .encode(&CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_slice_follows_greedy_requirements_only() {
        let catalog = InMemoryCatalog::from_units(vec![
            Unit::new("a", v("1.0"))
                .requires(Requirement::on_unit("b", r("1.0")))
                .requires(Requirement::on_unit("c", r("1.0")).non_greedy()),
            Unit::new("b", v("1.0")),
            Unit::new("c", v("1.0")),
            Unit::new("unrelated", v("1.0")),
        ]);
        let a = catalog.units()[0].clone();
        let mut request = ProfileChangeRequest::new();
        request.add(a);

        let problem = encode(&Profile::new(), &catalog, &request);
        let ids: Vec<&str> = problem.allocator.units().map(|(_, u)| u.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_filtered_units_are_absent() {
        let catalog = InMemoryCatalog::from_units(vec![
            Unit::new("a", v("1.0")).requires(Requirement::on_unit("frag", VersionRange::any())),
            Unit::new("frag", v("1.0")).with_filter(crate::filter::Filter::equals("osgi.os", "win32")),
        ]);
        let a = catalog.units()[0].clone();
        let mut request = ProfileChangeRequest::new();
        request.add(a);

        let context = PropertyContext::new().with("osgi.os", "linux");
        let problem = Projector::new(&Profile::new(), &catalog, &request, &context)
            .encode(&CancellationToken::new())
            .unwrap();
        assert_eq!(problem.allocator.num_units(), 1);
        // The requirement has no candidate, so `a` implies false
        assert!(problem
            .constraints
            .iter()
            .any(|(c, o)| matches!(o, ConstraintOrigin::Requirement { candidates, .. } if candidates.is_empty())
                && c.terms().len() == 1));
    }

    #[test]
    fn test_singleton_and_forcing_constraints() {
        let foo1 = Unit::new("foo", v("1.0")).singleton();
        let foo2 = Unit::new("foo", v("2.0")).singleton();
        let catalog = InMemoryCatalog::from_units(vec![foo1.clone(), foo2.clone()]);
        let profile = Profile::new().with_unit(foo1);
        let mut request = ProfileChangeRequest::new();
        request.add(foo2);

        let problem = encode(&profile, &catalog, &request);
        let origins: Vec<&ConstraintOrigin> = problem.constraints.iter().map(|(_, o)| o).collect();
        assert!(origins.iter().any(|o| matches!(o, ConstraintOrigin::Singleton { id, .. } if id == "foo")));
        assert!(origins.iter().any(|o| matches!(o, ConstraintOrigin::StrictAddition { unit: 2 })));
        // The installed version is replaceable, not forced
        assert!(!origins.iter().any(|o| matches!(o, ConstraintOrigin::Installed { .. })));
    }

    #[test]
    fn test_installed_non_singleton_stays_forced() {
        let lib1 = Unit::new("lib", v("1.0"));
        let lib2 = Unit::new("lib", v("2.0"));
        let catalog = InMemoryCatalog::from_units(vec![lib1.clone(), lib2.clone()]);
        let profile = Profile::new().with_unit(lib1);
        let mut request = ProfileChangeRequest::new();
        request.add(lib2);

        let problem = encode(&profile, &catalog, &request);
        assert!(problem
            .constraints
            .iter()
            .any(|(_, o)| matches!(o, ConstraintOrigin::Installed { unit: 1 })));
    }

    #[test]
    fn test_objective_tiers() {
        let b = Unit::new("b", v("1.0")).requires(Requirement::on_unit("c", VersionRange::any()).optional());
        let catalog = InMemoryCatalog::from_units(vec![b.clone(), Unit::new("c", v("1.0")), Unit::new("c", v("2.0"))]);
        let mut request = ProfileChangeRequest::new();
        request.add_optional(b);

        let problem = encode(&Profile::new(), &catalog, &request);
        // vars: b=1, c1=2, c2=3, miss=4
        let weight = |lit: Literal| {
            problem
                .objective
                .iter()
                .find(|(l, _)| *l == lit)
                .map(|(_, w)| *w)
                .unwrap()
        };
        assert_eq!(weight(3), 1);
        assert_eq!(weight(2), 2);
        assert_eq!(weight(1), 1);
        let version_total = 4;
        assert_eq!(weight(4), version_total + 1);
        assert_eq!(weight(-1), version_total + (version_total + 1) + 1);
    }

    #[test]
    fn test_cancellation_during_encoding() {
        let catalog = InMemoryCatalog::from_units(vec![Unit::new("a", v("1.0"))]);
        let mut request = ProfileChangeRequest::new();
        request.add(catalog.units()[0].clone());
        let token = CancellationToken::new();
        token.cancel();
        let result = Projector::new(&Profile::new(), &catalog, &request, &PropertyContext::new()).encode(&token);
        assert!(matches!(result, Err(ResolutionError::Cancelled)));
    }
}
