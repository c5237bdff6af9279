use std::time::Instant;

use super::constraint::Constraint;
use super::outcome::{Assignment, Budget, Interrupt, SolveOutcome, SolverStats};
use super::search::{ConstraintKind, SearchResult, SearchState};
use super::{ConstraintId, Literal, PseudoBooleanSolver, SolverOptions, VarId};

/// Conflict-driven clause learning over pseudo-boolean constraints, with
/// linear-search optimization and deletion-based core minimization.
#[derive(Debug, Default)]
pub struct CdclSolver {
    options: SolverOptions,
    num_vars: usize,
    constraints: Vec<Constraint>,
    objective: Vec<(Literal, u64)>,
    stats: SolverStats,
}

impl CdclSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    fn cost_of(&self, values: &[bool]) -> u64 {
        self.objective
            .iter()
            .filter(|(literal, _)| {
                let idx = (literal.unsigned_abs() - 1) as usize;
                values.get(idx).copied().unwrap_or(false) == (*literal > 0)
            })
            .fold(0u64, |acc, (_, weight)| acc.saturating_add(*weight))
    }

    /// `Σ wᵢ·lᵢ ≤ cost - 1`, written as `Σ wᵢ·¬lᵢ ≥ W - cost + 1`
    fn bound(&self, cost: u64) -> Constraint {
        let total: i128 = self.objective.iter().map(|(_, w)| i128::from(*w)).sum();
        let degree = total - i128::from(cost) + 1;
        Constraint::at_least(
            self.objective
                .iter()
                .map(|(literal, weight)| (i64::try_from(*weight).unwrap_or(i64::MAX), -literal)),
            i64::try_from(degree).unwrap_or(i64::MAX),
        )
    }

    /// Search state over all constraints, or only `subset`
    fn build_state(&self, subset: Option<&[ConstraintId]>, with_costs: bool) -> SearchState {
        let mut state = SearchState::new(self.num_vars);
        if with_costs {
            for &(literal, weight) in &self.objective {
                state.add_cost(literal, weight);
            }
        }

        let ids: Vec<ConstraintId> = match subset {
            Some(ids) => ids.to_vec(),
            None => (0..self.constraints.len() as ConstraintId).collect(),
        };
        for id in ids {
            if state.is_unsatisfiable() {
                break;
            }
            if let Some(constraint) = self.constraints.get(id as usize) {
                state.add_constraint(constraint, ConstraintKind::Original, vec![id]);
            }
        }
        state
    }

    /// Drop constraints from `core` one at a time while it stays unsatisfiable
    fn minimize_core(&self, core: Vec<ConstraintId>, budget: &Budget, stats: &mut SolverStats) -> Vec<ConstraintId> {
        if !self.options.minimize_core || core.len() <= 1 || core.len() > self.options.core_minimization_limit {
            return core;
        }

        let initial = core.len();
        let mut core = core;
        let mut i = 0;
        while i < core.len() {
            let candidate: Vec<ConstraintId> = core
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, &id)| id)
                .collect();

            stats.core_checks += 1;
            let mut state = self.build_state(Some(&candidate), false);
            match state.search(budget, stats) {
                // Every constraint confirmed so far is still in the smaller core
                SearchResult::Unsatisfiable(smaller) => core = smaller,
                SearchResult::Model(_) => i += 1,
                SearchResult::Interrupted(_) => {
                    log::debug!("Core minimization stopped by budget at {} constraints", core.len());
                    break;
                }
            }
        }

        log::debug!("Minimized unsatisfiable core from {} to {} constraints", initial, core.len());
        core
    }
}

impl PseudoBooleanSolver for CdclSolver {
    fn new_var(&mut self) -> VarId {
        self.num_vars += 1;
        self.num_vars as VarId
    }

    fn num_vars(&self) -> usize {
        self.num_vars
    }

    fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        self.num_vars = self.num_vars.max(constraint.max_var() as usize);
        let id = self.constraints.len() as ConstraintId;
        self.constraints.push(constraint);
        id
    }

    fn add_objective_term(&mut self, literal: Literal, weight: u64) {
        if weight == 0 || literal == 0 {
            return;
        }
        self.num_vars = self.num_vars.max(literal.unsigned_abs() as usize);
        self.objective.push((literal, weight));
    }

    fn solve(&mut self, budget: &Budget) -> SolveOutcome {
        let start = Instant::now();
        let mut stats = SolverStats {
            variables: self.num_vars,
            constraints: self.constraints.len(),
            ..Default::default()
        };

        let mut state = self.build_state(None, true);
        let mut best: Option<Assignment> = None;

        let outcome = loop {
            match state.search(budget, &mut stats) {
                SearchResult::Model(values) => {
                    stats.models += 1;
                    let cost = self.cost_of(&values);
                    log::debug!("Found model {} with cost {}", stats.models, cost);
                    let assignment = Assignment::new(values, cost);

                    if self.objective.is_empty() || cost == 0 {
                        break SolveOutcome::SatisfiableOptimal(assignment);
                    }
                    if !self.options.optimize {
                        break SolveOutcome::Satisfiable(assignment);
                    }

                    best = Some(assignment);
                    state.restart();
                    state.add_constraint(&self.bound(cost), ConstraintKind::Bound, Vec::new());
                }
                SearchResult::Unsatisfiable(core) => match best.take() {
                    Some(assignment) => break SolveOutcome::SatisfiableOptimal(assignment),
                    None => break SolveOutcome::Unsatisfiable(self.minimize_core(core, budget, &mut stats)),
                },
                SearchResult::Interrupted(Interrupt::Cancelled) => break SolveOutcome::Cancelled,
                SearchResult::Interrupted(Interrupt::Timeout) => match best.take() {
                    Some(assignment) => {
                        log::warn!(
                            "Solver budget exhausted, returning best solution so far (cost {})",
                            assignment.cost()
                        );
                        break SolveOutcome::Satisfiable(assignment);
                    }
                    None => break SolveOutcome::Timeout,
                },
            }
        };

        log::info!(
            "Solver completed in {:.3} seconds: {}",
            start.elapsed().as_secs_f64(),
            stats
        );
        self.stats = stats;
        outcome
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> CdclSolver {
        CdclSolver::new(SolverOptions::default())
    }

    #[test]
    fn test_optimal_selection() {
        // Pick exactly one of three versions; version 2 is cheapest.
        let mut s = solver();
        let (a, b, c) = (s.new_var(), s.new_var(), s.new_var());
        s.add_constraint(Constraint::cardinality([a, b, c], 1));
        s.add_constraint(Constraint::at_most([a, b, c], 1));
        s.add_objective_term(a, 3);
        s.add_objective_term(b, 1);
        s.add_objective_term(c, 2);

        match s.solve(&Budget::unlimited()) {
            SolveOutcome::SatisfiableOptimal(assignment) => {
                assert_eq!(assignment.true_vars().collect::<Vec<_>>(), vec![b]);
                assert_eq!(assignment.cost(), 1);
            }
            other => panic!("expected optimum, got {:?}", other),
        }
    }

    #[test]
    fn test_optimization_needs_search() {
        // x1 is cheap but forces the expensive x3; x2 alone is the optimum.
        let mut s = solver();
        for _ in 0..3 {
            s.new_var();
        }
        s.add_constraint(Constraint::clause([1, 2]));
        s.add_constraint(Constraint::implies_at_least(1, [3], 1));
        s.add_objective_term(1, 1);
        s.add_objective_term(2, 5);
        s.add_objective_term(3, 10);

        let outcome = s.solve(&Budget::unlimited());
        let assignment = outcome.assignment().unwrap();
        assert!(matches!(outcome, SolveOutcome::SatisfiableOptimal(_)));
        assert_eq!(assignment.true_vars().collect::<Vec<_>>(), vec![2]);
        assert!(s.stats().models >= 1);
    }

    #[test]
    fn test_without_optimization() {
        let mut s = CdclSolver::new(SolverOptions {
            optimize: false,
            ..Default::default()
        });
        let (a, b) = (s.new_var(), s.new_var());
        s.add_constraint(Constraint::clause([a, b]));
        s.add_objective_term(a, 1);
        s.add_objective_term(b, 1);
        assert!(matches!(s.solve(&Budget::unlimited()), SolveOutcome::Satisfiable(_)));
    }

    #[test]
    fn test_minimized_core() {
        let mut s = solver();
        for _ in 0..4 {
            s.new_var();
        }
        let noise = s.add_constraint(Constraint::clause([3, 4]));
        let force = s.add_constraint(Constraint::unit(1));
        let needs = s.add_constraint(Constraint::implies_at_least(1, [2], 1));
        let noise2 = s.add_constraint(Constraint::implies_at_least(3, [4], 1));
        let forbid = s.add_constraint(Constraint::unit(-2));

        match s.solve(&Budget::unlimited()) {
            SolveOutcome::Unsatisfiable(core) => {
                assert_eq!(core, vec![force, needs, forbid]);
                assert!(!core.contains(&noise));
                assert!(!core.contains(&noise2));
            }
            other => panic!("expected unsat, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        use crate::solver::CancellationToken;

        let token = CancellationToken::new();
        token.cancel();
        let mut s = solver();
        // Pigeonhole 4 into 3 needs conflicts, so the budget is consulted.
        let var = |i: i32, j: i32| 3 * i + j + 1;
        for i in 0..4 {
            s.add_constraint(Constraint::clause((0..3).map(|j| var(i, j))));
        }
        for j in 0..3 {
            s.add_constraint(Constraint::at_most((0..4).map(|i| var(i, j)), 1));
        }
        let outcome = s.solve(&Budget::unlimited().with_cancellation(token));
        assert_eq!(outcome, SolveOutcome::Cancelled);
    }

    #[test]
    fn test_deterministic_assignments() {
        let build = || {
            let mut s = solver();
            for _ in 0..6 {
                s.new_var();
            }
            s.add_constraint(Constraint::cardinality([1, 2, 3], 1));
            s.add_constraint(Constraint::implies_at_least(2, [4, 5], 1));
            s.add_constraint(Constraint::at_most([4, 5, 6], 1));
            s.add_objective_term(1, 2);
            s.add_objective_term(2, 2);
            s.add_objective_term(3, 4);
            s
        };
        let first = build().solve(&Budget::unlimited());
        for _ in 0..5 {
            assert_eq!(build().solve(&Budget::unlimited()), first);
        }
    }
}
