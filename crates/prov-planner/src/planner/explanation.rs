use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::projector::{ConstraintOrigin, EncodedProblem};
use crate::model::{Requirement, Unit};
use crate::solver::{ConstraintId, VarId};

/// One reason contributing to an unsatisfiable request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationEntry {
    /// `unit` needs `requirement`; `candidates` are every unit that could
    /// satisfy it in this resolution
    Requirement {
        unit: Arc<Unit>,
        requirement: Requirement,
        candidates: Vec<Arc<Unit>>,
    },
    Singleton {
        id: String,
        units: Vec<Arc<Unit>>,
    },
    StrictAddition {
        unit: Arc<Unit>,
    },
    Installed {
        unit: Arc<Unit>,
    },
    Removal {
        unit: Arc<Unit>,
    },
}

impl ExplanationEntry {
    /// Roots first, then the requirement chain, then exclusions
    fn rank(&self) -> u8 {
        match self {
            ExplanationEntry::StrictAddition { .. } => 0,
            ExplanationEntry::Installed { .. } => 1,
            ExplanationEntry::Requirement { .. } => 2,
            ExplanationEntry::Singleton { .. } => 3,
            ExplanationEntry::Removal { .. } => 4,
        }
    }
}

fn join_units(units: &[Arc<Unit>]) -> String {
    units.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ExplanationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplanationEntry::Requirement {
                unit,
                requirement,
                candidates,
            } => {
                if candidates.is_empty() {
                    write!(f, "{} requires {}, but no candidate is available", unit, requirement)
                } else {
                    write!(
                        f,
                        "{} requires {}, which only {} can satisfy",
                        unit,
                        requirement,
                        join_units(candidates)
                    )
                }
            }
            ExplanationEntry::Singleton { id, units } => {
                write!(
                    f,
                    "Only one version of singleton {} can be installed: {}",
                    id,
                    join_units(units)
                )
            }
            ExplanationEntry::StrictAddition { unit } => write!(f, "{} was requested", unit),
            ExplanationEntry::Installed { unit } => write!(f, "{} is installed and must be kept", unit),
            ExplanationEntry::Removal { unit } => write!(f, "{} was requested to be removed", unit),
        }
    }
}

/// Human-traceable account of why a request cannot be satisfied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    entries: Vec<ExplanationEntry>,
}

impl Explanation {
    pub fn new(entries: Vec<ExplanationEntry>) -> Self {
        Self { entries }
    }

    /// Map an unsatisfiable core back to the model
    pub fn from_core(problem: &EncodedProblem, core: &[ConstraintId]) -> Self {
        let unit = |var: VarId| problem.allocator.unit(var).cloned();
        let units = |vars: &[VarId]| -> Vec<Arc<Unit>> {
            vars.iter().filter_map(|&v| problem.allocator.unit(v).cloned()).collect()
        };

        let mut seen: HashSet<(u8, Option<VarId>, usize, String)> = HashSet::new();
        let mut entries = Vec::new();

        for &id in core {
            let Some(origin) = problem.origin(id) else {
                continue;
            };
            let entry = match origin {
                ConstraintOrigin::Requirement {
                    unit: var,
                    requirement,
                    candidates,
                }
                | ConstraintOrigin::OptionalRequirement {
                    unit: var,
                    requirement,
                    candidates,
                } => {
                    if !seen.insert((2, Some(*var), *requirement, String::new())) {
                        continue;
                    }
                    let Some(owner) = unit(*var) else { continue };
                    let Some(req) = owner.requirements().get(*requirement).cloned() else {
                        continue;
                    };
                    ExplanationEntry::Requirement {
                        unit: owner,
                        requirement: req,
                        candidates: units(candidates),
                    }
                }
                ConstraintOrigin::Singleton { id, units: vars } => {
                    if !seen.insert((3, None, 0, id.clone())) {
                        continue;
                    }
                    ExplanationEntry::Singleton {
                        id: id.clone(),
                        units: units(vars),
                    }
                }
                ConstraintOrigin::StrictAddition { unit: var } => match unit(*var) {
                    Some(unit) => ExplanationEntry::StrictAddition { unit },
                    None => continue,
                },
                ConstraintOrigin::Installed { unit: var } => match unit(*var) {
                    Some(unit) => ExplanationEntry::Installed { unit },
                    None => continue,
                },
                ConstraintOrigin::Removal { unit: var } => match unit(*var) {
                    Some(unit) => ExplanationEntry::Removal { unit },
                    None => continue,
                },
            };
            entries.push(entry);
        }

        // Stable: within a rank, entries keep encoding order
        entries.sort_by_key(ExplanationEntry::rank);
        Self { entries }
    }

    pub fn entries(&self) -> &[ExplanationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The (unit, requirement) pairs of the explanation, in chain order
    pub fn requirement_chain(&self) -> Vec<(&Arc<Unit>, &Requirement)> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ExplanationEntry::Requirement { unit, requirement, .. } => Some((unit, requirement)),
                _ => None,
            })
            .collect()
    }

    /// Render the explanation, one entry per line
    pub fn describe(&self) -> String {
        if self.entries.is_empty() {
            return "  - no further explanation is available".to_string();
        }
        self.entries
            .iter()
            .map(|entry| format!("  - {}", entry))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
