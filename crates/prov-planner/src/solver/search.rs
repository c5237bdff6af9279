//! Conflict-driven search over normalized pseudo-boolean constraints.
//!
//! Propagation tracks the slack of every constraint (the weight of its
//! non-false literals minus its degree). A negative slack is a conflict; an
//! unassigned literal whose coefficient exceeds the slack is implied.
//! Conflicts are explained with clauses, so learning is plain 1-UIP
//! resolution.

use std::collections::BTreeSet;

use super::constraint::{Constraint, Term};
use super::decisions::Decisions;
use super::outcome::{Budget, Interrupt, SolverStats};
use super::{literal_to_index, ConstraintId, Literal, VarId};

/// Where a stored constraint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    /// A hard constraint added by the caller
    Original,
    /// An objective bound added during optimization
    Bound,
    /// Derived by conflict analysis
    Learned,
}

#[derive(Debug)]
struct StoredConstraint {
    terms: Vec<Term>,
    degree: u64,
    max_coefficient: u64,
    kind: ConstraintKind,
    /// Caller constraints this one depends on, sorted
    origins: Vec<ConstraintId>,
}

#[derive(Debug)]
pub(crate) enum SearchResult {
    Model(Vec<bool>),
    Unsatisfiable(Vec<ConstraintId>),
    Interrupted(Interrupt),
}

pub(crate) struct SearchState {
    num_vars: usize,
    constraints: Vec<StoredConstraint>,
    /// Literal index -> (constraint index, coefficient)
    occurrences: Vec<Vec<(usize, u64)>>,
    slack: Vec<i128>,
    true_weight: Vec<i128>,
    decisions: Decisions,
    queue_head: usize,
    /// Objective weight carried by each literal, by literal index
    literal_cost: Vec<u64>,
    /// Caller constraints behind each level-0 assignment
    root_origins: Vec<Vec<ConstraintId>>,
    /// Set once the constraints are known to be unsatisfiable
    root_conflict: Option<Vec<ConstraintId>>,
    pending_conflict: Option<usize>,
    seen: Vec<bool>,
}

impl SearchState {
    pub(crate) fn new(num_vars: usize) -> Self {
        let literal_slots = 2 * (num_vars + 1);
        Self {
            num_vars,
            constraints: Vec::new(),
            occurrences: vec![Vec::new(); literal_slots],
            slack: Vec::new(),
            true_weight: Vec::new(),
            decisions: Decisions::with_capacity(num_vars),
            queue_head: 0,
            literal_cost: vec![0; literal_slots],
            root_origins: vec![Vec::new(); num_vars + 1],
            root_conflict: None,
            pending_conflict: None,
            seen: vec![false; num_vars + 1],
        }
    }

    /// Register an objective term; only steers the decision heuristic
    pub(crate) fn add_cost(&mut self, literal: Literal, weight: u64) {
        let idx = literal_to_index(literal);
        if idx < self.literal_cost.len() {
            self.literal_cost[idx] = self.literal_cost[idx].saturating_add(weight);
        }
    }

    pub(crate) fn is_unsatisfiable(&self) -> bool {
        self.root_conflict.is_some()
    }

    /// Add a constraint at decision level 0.
    ///
    /// Must be called before searching or right after `restart`.
    pub(crate) fn add_constraint(&mut self, constraint: &Constraint, kind: ConstraintKind, origins: Vec<ConstraintId>) {
        if self.root_conflict.is_some() {
            return;
        }
        debug_assert_eq!(self.decisions.level(), 0);
        let idx = self.attach(constraint.terms().to_vec(), constraint.degree(), kind, origins);
        if let Some(conflict) = self.check_new(idx).or_else(|| self.propagate_all()) {
            self.root_conflict = Some(self.root_core(conflict));
        }
    }

    /// Return to level 0, keeping learned constraints
    pub(crate) fn restart(&mut self) {
        self.backjump(0);
    }

    fn attach(&mut self, terms: Vec<Term>, degree: u64, kind: ConstraintKind, origins: Vec<ConstraintId>) -> usize {
        let idx = self.constraints.len();
        let mut slack = -i128::from(degree);
        let mut true_weight = 0i128;
        let mut max_coefficient = 0;

        for term in &terms {
            let slot = literal_to_index(term.literal);
            if slot >= self.occurrences.len() {
                continue;
            }
            self.occurrences[slot].push((idx, term.coefficient));
            max_coefficient = max_coefficient.max(term.coefficient);
            if !self.decisions.conflict(term.literal) {
                slack += i128::from(term.coefficient);
            }
            if self.decisions.satisfied(term.literal) {
                true_weight += i128::from(term.coefficient);
            }
        }

        self.constraints.push(StoredConstraint {
            terms,
            degree,
            max_coefficient,
            kind,
            origins,
        });
        self.slack.push(slack);
        self.true_weight.push(true_weight);
        idx
    }

    /// Propagate a freshly attached constraint under the current assignment
    fn check_new(&mut self, idx: usize) -> Option<usize> {
        if self.slack[idx] < 0 {
            return Some(idx);
        }
        self.propagate_constraint(idx);
        None
    }

    fn assign(&mut self, literal: Literal, reason: Option<usize>) {
        if self.decisions.level() == 0 {
            let origins = match reason {
                Some(c) => {
                    let mut origins: BTreeSet<ConstraintId> = self.constraints[c].origins.iter().copied().collect();
                    for term in &self.constraints[c].terms {
                        if self.decisions.conflict(term.literal) {
                            origins.extend(self.root_origins[term.literal.unsigned_abs() as usize].iter().copied());
                        }
                    }
                    origins.into_iter().collect()
                }
                None => Vec::new(),
            };
            self.root_origins[literal.unsigned_abs() as usize] = origins;
        }

        self.decisions.decide(literal, reason);
        for &(c, a) in &self.occurrences[literal_to_index(literal)] {
            self.true_weight[c] += i128::from(a);
        }
        for &(c, a) in &self.occurrences[literal_to_index(-literal)] {
            self.slack[c] -= i128::from(a);
        }
    }

    fn backjump(&mut self, level: u32) {
        let Self {
            decisions,
            occurrences,
            slack,
            true_weight,
            ..
        } = self;
        decisions.revert_to_level(level, |literal| {
            for &(c, a) in &occurrences[literal_to_index(literal)] {
                true_weight[c] -= i128::from(a);
            }
            for &(c, a) in &occurrences[literal_to_index(-literal)] {
                slack[c] += i128::from(a);
            }
        });
        self.queue_head = self.queue_head.min(self.decisions.len());
    }

    /// Imply every unassigned literal whose coefficient exceeds the slack
    fn propagate_constraint(&mut self, c: usize) -> u64 {
        let slack = self.slack[c];
        if i128::from(self.constraints[c].max_coefficient) <= slack {
            return 0;
        }
        let mut implied = 0;
        for t in 0..self.constraints[c].terms.len() {
            let term = self.constraints[c].terms[t];
            if i128::from(term.coefficient) > slack && self.decisions.undecided(term.literal) {
                self.assign(term.literal, Some(c));
                implied += 1;
            }
        }
        implied
    }

    /// Process the trail until a fixed point or a conflict
    fn propagate(&mut self, stats: &mut SolverStats) -> Option<usize> {
        if let Some(conflict) = self.pending_conflict.take() {
            return Some(conflict);
        }
        while self.queue_head < self.decisions.len() {
            let literal = self.decisions.literal_at(self.queue_head);
            self.queue_head += 1;

            let falsified = literal_to_index(-literal);
            for k in 0..self.occurrences[falsified].len() {
                let (c, _) = self.occurrences[falsified][k];
                if self.slack[c] < 0 {
                    return Some(c);
                }
                stats.propagations += self.propagate_constraint(c);
            }
        }
        None
    }

    fn propagate_all(&mut self) -> Option<usize> {
        let mut scratch = SolverStats::default();
        self.propagate(&mut scratch)
    }

    /// False literals of `c` assigned before `implied`, or all of them
    fn explain(&self, c: usize, implied: Option<Literal>) -> Vec<Literal> {
        let limit = implied.and_then(|l| self.decisions.position(l));
        self.constraints[c]
            .terms
            .iter()
            .map(|t| t.literal)
            .filter(|&l| self.decisions.conflict(l))
            .filter(|&l| match (limit, self.decisions.position(l)) {
                (Some(limit), Some(pos)) => pos < limit,
                _ => true,
            })
            .collect()
    }

    /// Origins of a conflict that holds at level 0
    fn root_core(&self, conflict: usize) -> Vec<ConstraintId> {
        let mut core: BTreeSet<ConstraintId> = self.constraints[conflict].origins.iter().copied().collect();
        for literal in self.explain(conflict, None) {
            core.extend(self.root_origins[literal.unsigned_abs() as usize].iter().copied());
        }
        core.into_iter().collect()
    }

    /// 1-UIP conflict analysis.
    ///
    /// Returns the learned clause with its asserting literal first, the
    /// backjump level and the caller constraints the clause was derived from.
    fn analyze(&mut self, conflict: usize) -> (Vec<Literal>, u32, Vec<ConstraintId>) {
        let level = self.decisions.level();
        let mut origins: BTreeSet<ConstraintId> = self.constraints[conflict].origins.iter().copied().collect();
        let mut learned: Vec<Literal> = vec![0];
        let mut pending = 0usize;
        let mut clause = self.explain(conflict, None);
        let mut index = self.decisions.len();

        loop {
            for &q in &clause {
                let var = q.unsigned_abs() as usize;
                let q_level = self.decisions.decision_level(q).unwrap_or(0);
                if q_level == 0 {
                    origins.extend(self.root_origins[var].iter().copied());
                    continue;
                }
                if self.seen[var] {
                    continue;
                }
                self.seen[var] = true;
                if q_level == level {
                    pending += 1;
                } else {
                    learned.push(q);
                }
            }

            // Most recent marked literal of the current level
            let p = loop {
                if index == 0 {
                    break None;
                }
                index -= 1;
                let candidate = self.decisions.literal_at(index);
                let var = candidate.unsigned_abs() as usize;
                if self.seen[var] && self.decisions.decision_level(candidate) == Some(level) {
                    break Some(candidate);
                }
            };
            let Some(p) = p else {
                break;
            };

            self.seen[p.unsigned_abs() as usize] = false;
            pending = pending.saturating_sub(1);
            if pending == 0 {
                learned[0] = -p;
                break;
            }

            match self.decisions.reason(p) {
                Some(reason) => {
                    origins.extend(self.constraints[reason].origins.iter().copied());
                    clause = self.explain(reason, Some(p));
                }
                None => {
                    learned[0] = -p;
                    break;
                }
            }
        }

        let backjump = learned[1..]
            .iter()
            .map(|&q| self.decisions.decision_level(q).unwrap_or(0))
            .max()
            .unwrap_or(0);
        self.seen.fill(false);

        learned.retain(|&l| l != 0);
        (learned, backjump, origins.into_iter().collect())
    }

    /// Next decision literal, or `None` when every variable is assigned
    fn pick_decision(&self) -> Option<Literal> {
        for (c, constraint) in self.constraints.iter().enumerate() {
            if constraint.kind == ConstraintKind::Learned {
                continue;
            }
            if self.true_weight[c] >= i128::from(constraint.degree) {
                continue;
            }
            let best = constraint
                .terms
                .iter()
                .filter(|t| self.decisions.undecided(t.literal))
                .min_by_key(|t| self.cost_delta(t.literal));
            if let Some(term) = best {
                return Some(term.literal);
            }
        }

        // Every constraint holds: settle the rest on their cheaper value
        (1..=self.num_vars as VarId)
            .find(|&var| self.decisions.undecided(var))
            .map(|var| if self.cost_delta(var) < 0 { var } else { -var })
    }

    /// cost(l) - cost(¬l)
    fn cost_delta(&self, literal: Literal) -> i128 {
        i128::from(self.literal_cost[literal_to_index(literal)])
            - i128::from(self.literal_cost[literal_to_index(-literal)])
    }

    fn model(&self) -> Vec<bool> {
        (1..=self.num_vars as VarId)
            .map(|var| self.decisions.value(var).unwrap_or(false))
            .collect()
    }

    /// Run until a model, a proof of unsatisfiability or budget exhaustion
    pub(crate) fn search(&mut self, budget: &Budget, stats: &mut SolverStats) -> SearchResult {
        if let Some(core) = &self.root_conflict {
            return SearchResult::Unsatisfiable(core.clone());
        }

        loop {
            if let Some(conflict) = self.propagate(stats) {
                stats.conflicts += 1;
                if self.decisions.level() == 0 {
                    let core = self.root_core(conflict);
                    self.root_conflict = Some(core.clone());
                    return SearchResult::Unsatisfiable(core);
                }

                let (learned, backjump, origins) = self.analyze(conflict);
                self.backjump(backjump);
                let constraint = Constraint::clause(learned);
                let idx = self.attach(
                    constraint.terms().to_vec(),
                    constraint.degree(),
                    ConstraintKind::Learned,
                    origins,
                );
                stats.learned += 1;
                self.pending_conflict = self.check_new(idx);

                if let Some(interrupt) = budget.check(stats.conflicts) {
                    return SearchResult::Interrupted(interrupt);
                }
                continue;
            }

            match self.pick_decision() {
                None => return SearchResult::Model(self.model()),
                Some(literal) => {
                    stats.decisions += 1;
                    if stats.decisions % 256 == 0 && budget.is_cancelled() {
                        return SearchResult::Interrupted(Interrupt::Cancelled);
                    }
                    self.decisions.increment_level();
                    self.assign(literal, None);
                }
            }
        }
    }
}
