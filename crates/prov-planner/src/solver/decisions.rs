use super::{Literal, VarId};

/// The assignment trail of a search.
///
/// `decision_map` stores 0 for undecided, `level + 1` for true and
/// `-(level + 1)` for false, so level 0 never reads as undecided. The queue
/// holds literals in assignment order; reverting pops from its end.
#[derive(Debug, Default)]
pub struct Decisions {
    decision_map: Vec<i32>,
    positions: Vec<usize>,
    /// Index of the constraint that implied each variable, `None` for decisions
    reasons: Vec<Option<usize>>,
    decision_queue: Vec<Literal>,
    level: u32,
}

impl Decisions {
    pub fn with_capacity(num_vars: usize) -> Self {
        Self {
            decision_map: vec![0; num_vars + 1],
            positions: vec![0; num_vars + 1],
            reasons: vec![None; num_vars + 1],
            decision_queue: Vec::with_capacity(num_vars),
            level: 0,
        }
    }

    #[inline]
    fn slot(var: VarId) -> usize {
        var.unsigned_abs() as usize
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn increment_level(&mut self) {
        self.level += 1;
    }

    /// Assign `literal` true at the current level.
    ///
    /// Returns false if the variable already holds the opposite value.
    pub fn decide(&mut self, literal: Literal, reason: Option<usize>) -> bool {
        let id = Self::slot(literal);
        if id >= self.decision_map.len() {
            self.decision_map.resize(id + 1, 0);
            self.positions.resize(id + 1, 0);
            self.reasons.resize(id + 1, None);
        }

        let existing = self.decision_map[id];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        let level_value = (self.level + 1) as i32;
        self.decision_map[id] = if literal > 0 { level_value } else { -level_value };
        self.positions[id] = self.decision_queue.len();
        self.reasons[id] = reason;
        self.decision_queue.push(literal);
        true
    }

    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        match self.decision_map.get(Self::slot(literal)) {
            Some(&d) if d != 0 => (d > 0) == (literal > 0),
            _ => false,
        }
    }

    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        match self.decision_map.get(Self::slot(literal)) {
            Some(&d) if d != 0 => (d > 0) != (literal > 0),
            _ => false,
        }
    }

    #[inline]
    pub fn undecided(&self, var: VarId) -> bool {
        self.decision_map.get(Self::slot(var)).map_or(true, |&d| d == 0)
    }

    /// Value of a variable, if decided
    pub fn value(&self, var: VarId) -> Option<bool> {
        match self.decision_map.get(Self::slot(var)) {
            Some(&d) if d != 0 => Some(d > 0),
            _ => None,
        }
    }

    #[inline]
    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        match self.decision_map.get(Self::slot(literal)) {
            Some(&d) if d != 0 => Some(d.unsigned_abs() - 1),
            _ => None,
        }
    }

    /// Trail position of a decided variable
    #[inline]
    pub fn position(&self, literal: Literal) -> Option<usize> {
        if self.undecided(literal) {
            None
        } else {
            Some(self.positions[Self::slot(literal)])
        }
    }

    /// Constraint that implied a decided variable
    pub fn reason(&self, literal: Literal) -> Option<usize> {
        if self.undecided(literal) {
            None
        } else {
            self.reasons[Self::slot(literal)]
        }
    }

    /// Literal at a trail position
    #[inline]
    pub fn literal_at(&self, index: usize) -> Literal {
        self.decision_queue[index]
    }

    /// Undo every assignment above `target_level`, oldest last.
    pub fn revert_to_level(&mut self, target_level: u32, mut on_undo: impl FnMut(Literal)) {
        while let Some(&literal) = self.decision_queue.last() {
            let id = Self::slot(literal);
            if self.decision_map[id].unsigned_abs() - 1 <= target_level {
                break;
            }
            self.decision_queue.pop();
            self.decision_map[id] = 0;
            self.reasons[id] = None;
            on_undo(literal);
        }
        self.level = target_level;
    }

    pub fn queue(&self) -> &[Literal] {
        &self.decision_queue
    }

    pub fn len(&self) -> usize {
        self.decision_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decision_queue.is_empty()
    }
}
