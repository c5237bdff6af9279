//! Resolution of profile change requests.
//!
//! A resolution runs in four steps, each owning its state for the duration
//! of one call:
//!
//! 1. [`Projector`] slices the catalog and encodes the request as
//!    pseudo-boolean constraints plus a layered objective
//! 2. a [`PseudoBooleanSolver`](crate::solver::PseudoBooleanSolver) searches
//!    for the cheapest consistent assignment
//! 3. [`SolutionExtractor`] maps the assignment back to units and re-checks it
//! 4. the selection is diffed against the profile into [`Operand`]s
//!
//! When no assignment exists, the solver's conflict core becomes an
//! [`Explanation`].

mod allocator;
mod explanation;
mod extractor;
mod operand;
#[allow(clippy::module_inception)]
mod planner;
mod projector;


pub use allocator::VariableAllocator;
pub use explanation::{Explanation, ExplanationEntry};
pub use extractor::SolutionExtractor;
pub use operand::{compute_operands, Operand, OperandKind, Plan};
pub use planner::Planner;
pub use projector::{ConstraintOrigin, EncodedProblem, Projector};
