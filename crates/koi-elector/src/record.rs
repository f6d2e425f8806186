use std::time::{Duration, Instant};

use koi_proto::{HealthReport, NodeId};

/// Runner lifecycle state as seen from the elector's side (spec §4.7),
/// ordered so that `>` comparisons match the spec's prose directly.
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
    pub fn from_wire(v: i64) -> Self {
        match v {
            0 => RunnerState::Failed,
            1 => RunnerState::Disconnected,
            2 => RunnerState::Stopped,
            3 => RunnerState::Live,
            4 => RunnerState::Slave,
            _ => RunnerState::Master,
        }
    }

    pub fn to_wire(self) -> i64 {
        self as i64
    }

    pub fn is_promoted(self) -> bool {
        self >= RunnerState::Slave
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    Active,
    Passive,
}

impl RunnerMode {
    pub fn from_wire(v: i64) -> Self {
        if v == 0 { RunnerMode::Active } else { RunnerMode::Passive }
    }
}

/// Created on first health report, mutated by every subsequent one,
/// destroyed after 30 minutes in a terminal state (spec §4.4, §4.6 step 5).
#[derive(Debug, Clone)]
pub struct RunnerRecord {
    pub id: NodeId,
    pub name: String,
    pub state: RunnerState,
    pub mode: RunnerMode,
    pub maintenance: bool,
    pub uptime: Duration,
    pub last_seen: Instant,
    pub last_failed: Option<Instant>,
    pub any_service_failed: bool,
    pub any_service_promoted_or_promoting: bool,
}

impl RunnerRecord {
    pub fn from_report(id: NodeId, report: &HealthReport, now: Instant) -> Self {
        let any_service_failed = report.services.iter().any(|s| s.failed);
        let mut record = Self {
            id,
            name: report.name.clone(),
            state: RunnerState::from_wire(report.state),
            mode: RunnerMode::from_wire(report.mode),
            maintenance: report.maintenance,
            uptime: Duration::from_millis(report.uptime_ms),
            last_seen: now,
            last_failed: None,
            any_service_failed,
            any_service_promoted_or_promoting: false,
        };
        if any_service_failed {
            record.last_failed = Some(now);
        }
        record
    }

    pub fn absorb_report(&mut self, report: &HealthReport, now: Instant) {
        self.name = report.name.clone();
        self.state = RunnerState::from_wire(report.state);
        self.mode = RunnerMode::from_wire(report.mode);
        self.maintenance = report.maintenance;
        self.uptime = Duration::from_millis(report.uptime_ms);
        self.last_seen = now;
        let any_service_failed = report.services.iter().any(|s| s.failed);
        self.any_service_failed = any_service_failed;
        if any_service_failed {
            self.last_failed = Some(now);
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state <= RunnerState::Disconnected
    }

    pub fn failure_age(&self, now: Instant) -> Duration {
        match self.last_failed {
            Some(t) => now.duration_since(t),
            None => Duration::MAX,
        }
    }
}
