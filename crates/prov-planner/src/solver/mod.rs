//! Pseudo-boolean optimization solver.
//!
//! The planner talks to the solver through [`PseudoBooleanSolver`]: it
//! allocates variables, adds normalized constraints and weighted objective
//! terms, and asks for a solution within a [`Budget`]. [`CdclSolver`] is the
//! built-in implementation.
//!
//! # Determinism
//!
//! Search is single-threaded and every choice is made in a fixed order:
//! the decision literal is taken from the first unsatisfied hard constraint
//! (in insertion order), preferring the literal whose truth costs least in the
//! objective and then the earliest term. Once all constraints hold, the
//! remaining variables take their cheaper value, false on ties. Identical
//! problems and configuration therefore produce identical assignments.

mod cdcl;
mod constraint;
mod decisions;
mod outcome;
mod search;

use serde::{Deserialize, Serialize};

pub use cdcl::CdclSolver;
pub use constraint::{Constraint, Term};
pub use decisions::Decisions;
pub use outcome::{Assignment, Budget, CancellationToken, Interrupt, SolveOutcome, SolverStats};

/// A boolean variable, numbered from 1
pub type VarId = i32;

/// A variable (`v`) or its negation (`-v`)
pub type Literal = i32;

/// Index of a hard constraint in insertion order
pub type ConstraintId = u32;

/// Dense index for a literal: `2v` for `v`, `2v + 1` for `-v`
#[inline]
pub(crate) fn literal_to_index(literal: Literal) -> usize {
    let var = literal.unsigned_abs() as usize;
    if literal > 0 {
        2 * var
    } else {
        2 * var + 1
    }
}

/// Solver behaviour that does not depend on the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    /// Keep tightening the objective bound after the first model
    pub optimize: bool,
    /// Shrink unsatisfiable cores by deletion
    pub minimize_core: bool,
    /// Cores larger than this are returned as found
    pub core_minimization_limit: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            minimize_core: true,
            core_minimization_limit: 64,
        }
    }
}

/// Narrow interface to a pseudo-boolean / weighted optimization solver
pub trait PseudoBooleanSolver {
    /// Allocate a fresh variable
    fn new_var(&mut self) -> VarId;

    fn num_vars(&self) -> usize;

    /// Add a hard constraint; ids are assigned in insertion order from 0
    fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId;

    /// Add `weight` to the objective whenever `literal` is true
    fn add_objective_term(&mut self, literal: Literal, weight: u64);

    /// Search for a minimum-cost assignment within `budget`
    fn solve(&mut self, budget: &Budget) -> SolveOutcome;

    /// Counters from the last `solve`
    fn stats(&self) -> SolverStats;
}

/// Available solver implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Cdcl,
}

impl SolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Cdcl => "cdcl",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cdcl" => Some(SolverKind::Cdcl),
            _ => None,
        }
    }

    /// Build a fresh solver instance
    pub fn create(&self, options: SolverOptions) -> Box<dyn PseudoBooleanSolver> {
        match self {
            SolverKind::Cdcl => Box::new(CdclSolver::new(options)),
        }
    }
}
