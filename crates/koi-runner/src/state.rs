/// Runner lifecycle state (spec §4.7). Initial state is `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunnerState {
    Failed,
    Disconnected,
    Stopped,
    Live,
    Slave,
    Master,
}

impl RunnerState {
    pub fn to_wire(self) -> i64 {
        self as i64
    }

    /// Name injected into service scripts via `KOI_STATE` (spec §4.8).
    pub fn name(self) -> &'static str {
        match self {
            RunnerState::Failed => "Failed",
            RunnerState::Disconnected => "Disconnected",
            RunnerState::Stopped => "Stopped",
            RunnerState::Live => "Live",
            RunnerState::Slave => "Slave",
            RunnerState::Master => "Master",
        }
    }
}

/// What the service supervisor reports back after a tick (spec §4.7
/// "Service verdict"): whether any service failed, and whether the
/// service set as a whole is eligible for promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceVerdict {
    pub any_failed: bool,
    pub promotable: bool,
}
