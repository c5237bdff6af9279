//! Immutable value objects: units, capabilities, requirements, profiles and
//! change requests.

mod profile;
mod request;
mod requirement;
mod unit;

pub use profile::{InclusionRule, Profile};
pub use request::ProfileChangeRequest;
pub use requirement::Requirement;
pub use unit::{Capability, Unit, UnitKey, IU_NAMESPACE};
