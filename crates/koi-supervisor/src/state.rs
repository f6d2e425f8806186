/// Per-service lifecycle state (spec §4.8). Declaration order doubles as
/// the comparison order the target-resolution table relies on (`> Starting`,
/// `< Demoting`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceState {
    Failed,
    Failing,
    Stopped,
    Stopping,
    Starting,
    Started,
    Demoting,
    Promoting,
    Promoted,
}

impl ServiceState {
    pub fn to_wire(self) -> i64 {
        self as i64
    }
}

/// The supervisor's current goal for a service (spec §4.8), set by runner
/// calls `start/stop/promote/demote/fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAction {
    Fail,
    Stop,
    Start,
    Demote,
    Promote,
}

impl TargetAction {
    /// Whether `state` already satisfies this target (spec §4.8's table).
    pub fn is_resolved(self, state: ServiceState) -> bool {
        match self {
            TargetAction::Fail => state == ServiceState::Failed,
            TargetAction::Stop => state == ServiceState::Failed || state == ServiceState::Stopped,
            TargetAction::Start => state > ServiceState::Starting,
            TargetAction::Demote => state < ServiceState::Demoting,
            TargetAction::Promote => state == ServiceState::Promoted,
        }
    }

    /// The script event name run while driving toward this target, or
    /// `None` if the target resolves without running a script (e.g. a
    /// synthetic `fail`).
    pub fn event_name(self) -> Option<&'static str> {
        match self {
            TargetAction::Fail => None,
            TargetAction::Stop => Some("stop"),
            TargetAction::Start => Some("start"),
            TargetAction::Demote => Some("demote"),
            TargetAction::Promote => Some("promote"),
        }
    }

    /// The transient "running the script" state entered while driving.
    pub fn driving_state(self) -> ServiceState {
        match self {
            TargetAction::Fail => ServiceState::Failed,
            TargetAction::Stop => ServiceState::Stopping,
            TargetAction::Start => ServiceState::Starting,
            TargetAction::Demote => ServiceState::Demoting,
            TargetAction::Promote => ServiceState::Promoting,
        }
    }

    /// The state reached on the script's success.
    pub fn settled_state(self) -> ServiceState {
        match self {
            TargetAction::Fail => ServiceState::Failed,
            TargetAction::Stop => ServiceState::Stopped,
            TargetAction::Start => ServiceState::Started,
            TargetAction::Demote => ServiceState::Started,
            TargetAction::Promote => ServiceState::Promoted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_target_resolution_pair_from_spec_table() {
        assert!(TargetAction::Fail.is_resolved(ServiceState::Failed));
        assert!(TargetAction::Stop.is_resolved(ServiceState::Stopped));
        assert!(TargetAction::Stop.is_resolved(ServiceState::Failed));
        assert!(TargetAction::Start.is_resolved(ServiceState::Started));
        assert!(TargetAction::Start.is_resolved(ServiceState::Promoted));
        assert!(!TargetAction::Start.is_resolved(ServiceState::Starting));
        assert!(TargetAction::Demote.is_resolved(ServiceState::Started));
        assert!(!TargetAction::Demote.is_resolved(ServiceState::Promoted));
        assert!(TargetAction::Promote.is_resolved(ServiceState::Promoted));
        assert!(!TargetAction::Promote.is_resolved(ServiceState::Started));
    }
}
