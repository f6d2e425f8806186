//! Master election, quorum enforcement, and runner health tracking (spec §4.6).

mod config;
mod elector;
mod failure;
mod record;

pub use config::ElectorConfig;
pub use elector::Elector;
pub use failure::{FailureLog, FailureRecord};
pub use record::{RunnerMode, RunnerRecord, RunnerState};
