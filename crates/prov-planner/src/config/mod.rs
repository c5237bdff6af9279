//! Planner configuration
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Environment variables (`PROV_*`, e.g. `PROV_CONFLICT_LIMIT`)
//! 2. A config file passed to [`PlannerConfig::build`]
//! 3. The user config file `<config dir>/prov/planner.json` (or `$PROV_HOME/planner.json`)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use prov_planner::config::PlannerConfig;
//!
//! let config = PlannerConfig::build(None::<&str>, true).unwrap();
//! let budget = config.budget();
//! println!("conflict limit: {:?}", budget.conflict_limit());
//! ```

mod config;
mod source;

pub use config::PlannerConfig;
pub use source::{ConfigLoader, ConfigSource, RawConfig};
