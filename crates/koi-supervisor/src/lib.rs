//! Service directory discovery and per-service script supervision (spec §4.8).

mod discovery;
mod process;
mod state;
mod supervisor;

pub use discovery::{discover, DiscoveryError, ScriptLayout, ServiceEntry};
pub use process::{ScriptOutcome, STATUS_EXIT_PROMOTED, STATUS_EXIT_STARTED, STATUS_EXIT_STOPPED};
pub use state::{ServiceState, TargetAction};
pub use supervisor::{ServiceReport, Supervisor, SupervisorConfig};
