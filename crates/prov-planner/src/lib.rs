//! Constraint-based provisioning planner.
//!
//! Given the units installed in a [`Profile`], a [`Catalog`] of available
//! units and a [`ProfileChangeRequest`], the [`Planner`] computes the
//! [`Operand`]s that bring the profile to a consistent state satisfying the
//! request, or an [`Explanation`] of why no such state exists.

pub mod catalog;
pub mod config;
mod error;
pub mod filter;
pub mod model;
pub mod planner;
pub mod solver;

pub use catalog::{CapabilityQuery, Catalog, CompositeCatalog, InMemoryCatalog};
pub use config::PlannerConfig;
pub use error::{ConfigError, ResolutionError, Result};
pub use filter::{Filter, FilterError, PropertyContext};
pub use model::{Capability, InclusionRule, Profile, ProfileChangeRequest, Requirement, Unit, UnitKey};
pub use planner::{Explanation, ExplanationEntry, Operand, OperandKind, Plan, Planner};
pub use solver::{Budget, CancellationToken, CdclSolver, PseudoBooleanSolver, SolverKind};
