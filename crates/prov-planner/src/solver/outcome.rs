use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{ConstraintId, Literal, VarId};

/// Cooperative cancellation flag shared between a caller and a resolution
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a search stopped before reaching an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Timeout,
    Cancelled,
}

/// Resource ceiling for one resolution.
///
/// The conflict limit is deterministic; the wall-clock deadline is not, so
/// reproducible runs should rely on the former.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    conflict_limit: Option<u64>,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_conflict_limit(mut self, limit: u64) -> Self {
        self.conflict_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn conflict_limit(&self) -> Option<u64> {
        self.conflict_limit
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Check the budget after `conflicts` conflicts have been spent
    pub fn check(&self, conflicts: u64) -> Option<Interrupt> {
        if self.cancellation.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        if self.conflict_limit.is_some_and(|limit| conflicts >= limit) {
            return Some(Interrupt::Timeout);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(Interrupt::Timeout);
        }
        None
    }
}

/// A complete truth assignment over the solver's variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<bool>,
    cost: u64,
}

impl Assignment {
    pub(crate) fn new(values: Vec<bool>, cost: u64) -> Self {
        Self { values, cost }
    }

    /// Value of a variable; unknown variables read as false
    pub fn value(&self, var: VarId) -> bool {
        usize::try_from(var)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .and_then(|idx| self.values.get(idx).copied())
            .unwrap_or(false)
    }

    pub fn is_true(&self, literal: Literal) -> bool {
        self.value(literal.abs()) == (literal > 0)
    }

    /// Variables assigned true, ascending
    pub fn true_vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &value)| value)
            .map(|(idx, _)| (idx + 1) as VarId)
    }

    /// Objective value of this assignment
    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a solver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// A model, not proven optimal (budget ran out or optimization disabled)
    Satisfiable(Assignment),
    /// A model proven optimal for the objective
    SatisfiableOptimal(Assignment),
    /// No model exists; carries the hard constraints involved in the conflict
    Unsatisfiable(Vec<ConstraintId>),
    Timeout,
    Cancelled,
}

impl SolveOutcome {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            SolveOutcome::Satisfiable(a) | SolveOutcome::SatisfiableOptimal(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_satisfiable(&self) -> bool {
        self.assignment().is_some()
    }
}

/// Counters collected during one solve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub variables: usize,
    pub constraints: usize,
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub learned: u64,
    pub models: u64,
    pub core_checks: u64,
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vars, {} constraints, {} decisions, {} propagations, {} conflicts, {} learned, {} models",
            self.variables,
            self.constraints,
            self.decisions,
            self.propagations,
            self.conflicts,
            self.learned,
            self.models
        )
    }
}
