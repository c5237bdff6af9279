//! Versions and version ranges for installable units.
//!
//! Versions follow the `major.minor.micro.qualifier` shape: missing numeric
//! segments are zero and a version without a qualifier sorts before the same
//! numeric version carrying one. Ranges are intervals written in interval
//! notation (`[1.0,2.0)`) or as a bare minimum version (`1.0` meaning `>= 1.0`).

mod range;
mod version;

pub use range::{Bound, VersionRange};
pub use version::{Version, VersionError};
