//! Normalized pseudo-boolean constraints.
//!
//! Every constraint is kept in the form `Σ aᵢ·lᵢ ≥ d` with positive
//! coefficients, at most one literal per variable and coefficients saturated
//! at the degree. Negative coefficients are flipped onto the negated literal,
//! and repeated variables are merged, during construction.

use std::fmt;

use indexmap::IndexMap;

use super::{Literal, VarId};

/// `coefficient · literal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    pub coefficient: u64,
    pub literal: Literal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    terms: Vec<Term>,
    degree: u64,
}

impl Constraint {
    /// `Σ aᵢ·lᵢ ≥ degree` for arbitrary signed coefficients
    pub fn at_least<I>(terms: I, degree: i64) -> Self
    where
        I: IntoIterator<Item = (i64, Literal)>,
    {
        // Signed coefficient per variable, on its positive literal
        let mut merged: IndexMap<VarId, i128> = IndexMap::new();
        let mut degree = i128::from(degree);

        for (coefficient, literal) in terms {
            if coefficient == 0 || literal == 0 {
                continue;
            }
            let coefficient = i128::from(coefficient);
            let var = literal.abs();
            if literal > 0 {
                *merged.entry(var).or_insert(0) += coefficient;
            } else {
                // a·¬x = a - a·x
                degree -= coefficient;
                *merged.entry(var).or_insert(0) -= coefficient;
            }
        }

        let mut normalized = Vec::with_capacity(merged.len());
        for (var, coefficient) in merged {
            if coefficient > 0 {
                normalized.push((coefficient, var));
            } else if coefficient < 0 {
                // -a·x = -a + a·¬x
                degree -= coefficient;
                normalized.push((-coefficient, -var));
            }
        }

        if degree <= 0 {
            return Self::tautology();
        }

        let terms = normalized
            .into_iter()
            .map(|(coefficient, literal)| Term {
                coefficient: clamp_u64(coefficient.min(degree)),
                literal,
            })
            .collect();

        Self {
            terms,
            degree: clamp_u64(degree),
        }
    }

    /// The empty constraint `0 ≥ 0`
    pub fn tautology() -> Self {
        Self {
            terms: Vec::new(),
            degree: 0,
        }
    }

    /// `l₁ ∨ l₂ ∨ … `
    pub fn clause<I: IntoIterator<Item = Literal>>(literals: I) -> Self {
        Self::at_least(literals.into_iter().map(|l| (1, l)), 1)
    }

    pub fn unit(literal: Literal) -> Self {
        Self::clause([literal])
    }

    /// At least `k` of `literals` are true
    pub fn cardinality<I: IntoIterator<Item = Literal>>(literals: I, k: u32) -> Self {
        Self::at_least(literals.into_iter().map(|l| (1, l)), i64::from(k))
    }

    /// At most `k` of `literals` are true, written `Σ ¬l ≥ n - k`
    pub fn at_most<I: IntoIterator<Item = Literal>>(literals: I, k: u32) -> Self {
        let literals: Vec<Literal> = literals.into_iter().collect();
        let n = literals.len() as i64;
        Self::at_least(literals.into_iter().map(|l| (1, -l)), n - i64::from(k))
    }

    /// `antecedent → at least min of literals`: `min·¬a + Σ l ≥ min`
    pub fn implies_at_least<I: IntoIterator<Item = Literal>>(antecedent: Literal, literals: I, min: u32) -> Self {
        let min = i64::from(min);
        let terms = std::iter::once((min, -antecedent)).chain(literals.into_iter().map(|l| (1, l)));
        Self::at_least(terms, min)
    }

    /// `antecedent → at most max of literals`: `(n - max)·¬a + Σ ¬l ≥ n - max`
    pub fn implies_at_most<I: IntoIterator<Item = Literal>>(antecedent: Literal, literals: I, max: u32) -> Self {
        let literals: Vec<Literal> = literals.into_iter().collect();
        let excess = literals.len() as i64 - i64::from(max);
        if excess <= 0 {
            return Self::tautology();
        }
        let terms = std::iter::once((excess, -antecedent)).chain(literals.into_iter().map(|l| (1, -l)));
        Self::at_least(terms, excess)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn degree(&self) -> u64 {
        self.degree
    }

    /// Satisfied by every assignment
    pub fn is_tautology(&self) -> bool {
        self.degree == 0
    }

    /// Largest variable mentioned
    pub fn max_var(&self) -> VarId {
        self.terms.iter().map(|t| t.literal.abs()).max().unwrap_or(0)
    }

    /// Evaluate under a truth function for literals
    pub fn is_satisfied_by(&self, is_true: impl Fn(Literal) -> bool) -> bool {
        let sum: u128 = self
            .terms
            .iter()
            .filter(|t| is_true(t.literal))
            .map(|t| u128::from(t.coefficient))
            .sum();
        sum >= u128::from(self.degree)
    }
}

fn clamp_u64(value: i128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0 >= {}", self.degree);
        }
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let lit = if t.literal > 0 {
                    format!("x{}", t.literal)
                } else {
                    format!("~x{}", -t.literal)
                };
                if t.coefficient == 1 {
                    lit
                } else {
                    format!("{} {}", t.coefficient, lit)
                }
            })
            .collect();
        write!(f, "{} >= {}", terms.join(" + "), self.degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(c: &Constraint) -> Vec<(u64, Literal)> {
        c.terms().iter().map(|t| (t.coefficient, t.literal)).collect()
    }

    #[test]
    fn test_clause() {
        let c = Constraint::clause([1, -2, 3]);
        assert_eq!(terms(&c), vec![(1, 1), (1, -2), (1, 3)]);
        assert_eq!(c.degree(), 1);
        assert_eq!(c.to_string(), "x1 + ~x2 + x3 >= 1");
    }

    #[test]
    fn test_negative_coefficients_flip() {
        // 2x1 - 3x2 >= -1  ==  2x1 + 3~x2 >= 2
        let c = Constraint::at_least([(2, 1), (-3, 2)], -1);
        assert_eq!(terms(&c), vec![(2, 1), (2, -2)]);
        assert_eq!(c.degree(), 2);
    }

    #[test]
    fn test_merge_same_variable() {
        // x1 + ~x1 + x2 >= 2  ==  x2 >= 1
        let c = Constraint::at_least([(1, 1), (1, -1), (1, 2)], 2);
        assert_eq!(terms(&c), vec![(1, 2)]);
        assert_eq!(c.degree(), 1);
    }

    #[test]
    fn test_at_most_one() {
        let c = Constraint::at_most([1, 2, 3], 1);
        assert_eq!(terms(&c), vec![(1, -1), (1, -2), (1, -3)]);
        assert_eq!(c.degree(), 2);
        assert!(c.is_satisfied_by(|l| l == 1 || l == -2 || l == -3));
        assert!(!c.is_satisfied_by(|l| l == 1 || l == 2 || l == -3));
    }

    #[test]
    fn test_implies_at_least_saturates() {
        let c = Constraint::implies_at_least(1, [2, 3], 2);
        assert_eq!(terms(&c), vec![(2, -1), (1, 2), (1, 3)]);
        assert_eq!(c.degree(), 2);

        let empty = Constraint::implies_at_least(1, [], 1);
        assert_eq!(terms(&empty), vec![(1, -1)]);
    }

    #[test]
    fn test_implies_at_most() {
        let c = Constraint::implies_at_most(1, [2, 3, 4], 1);
        assert_eq!(terms(&c), vec![(2, -1), (1, -2), (1, -3), (1, -4)]);
        assert_eq!(c.degree(), 2);
        assert!(Constraint::implies_at_most(1, [2], 1).is_tautology());
    }

    #[test]
    fn test_tautology() {
        assert!(Constraint::at_least([(1, 1)], 0).is_tautology());
        assert!(!Constraint::unit(1).is_tautology());
    }
}
