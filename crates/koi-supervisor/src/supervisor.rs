use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::discovery::{discover, DiscoveryError, ScriptLayout};
use crate::process::{run_event, ScriptOutcome};
use crate::state::{ServiceState, TargetAction};

/// Per-service tunables (spec §4.8, §6 `service.*` keys).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub services_folder: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub event_timeout: Duration,
    pub status_interval: Duration,
}

struct Service {
    name: String,
    priority: Option<u8>,
    layout: ScriptLayout,
    state: ServiceState,
    target: TargetAction,
    running: Option<(TargetOrStatus, JoinHandle<ScriptOutcome>)>,
    last_status_check: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOrStatus {
    Target(TargetAction),
    Status,
}

/// One service's contribution to an outgoing `HealthReport` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub name: String,
    pub event: String,
    pub state: ServiceState,
    pub failed: bool,
}

/// Drives every discovered service's state machine toward its current
/// target action, enforcing priority ordering between services (spec
/// §4.8). Script processes run as detached tokio tasks so `tick` never
/// blocks.
pub struct Supervisor {
    config: SupervisorConfig,
    services: Vec<Service>,
}

impl Supervisor {
    pub fn discover(config: SupervisorConfig) -> Result<Self, DiscoveryError> {
        let entries = discover(&config.services_folder)?;
        let services = entries
            .into_iter()
            .map(|e| Service {
                name: e.name,
                priority: e.priority,
                layout: e.layout,
                state: ServiceState::Stopped,
                target: if e.disabled { TargetAction::Stop } else { TargetAction::Start },
                running: None,
                last_status_check: None,
            })
            .collect();
        Ok(Self { config, services })
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.services.iter().find(|s| s.name == name).map(|s| s.state)
    }

    pub fn set_target(&mut self, name: &str, target: TargetAction) {
        if let Some(s) = self.services.iter_mut().find(|s| s.name == name) {
            s.target = target;
        }
    }

    pub fn any_failed(&self) -> bool {
        self.services.iter().any(|s| s.state == ServiceState::Failed)
    }

    /// Eligible for promotion once every service has reached at least
    /// `Started` (spec §4.7's runner-facing "promotable" notion).
    pub fn all_started_or_better(&self) -> bool {
        self.services.iter().all(|s| s.state >= ServiceState::Started)
    }

    pub fn any_promoted_or_promoting(&self) -> bool {
        self.services.iter().any(|s| s.state == ServiceState::Promoting || s.state == ServiceState::Promoted)
    }

    /// Per-service snapshot for the outgoing `HealthReport` (spec §6).
    pub fn service_reports(&self) -> Vec<ServiceReport> {
        self.services
            .iter()
            .map(|s| ServiceReport {
                name: s.name.clone(),
                event: s
                    .running
                    .as_ref()
                    .map(|(kind, _)| match kind {
                        TargetOrStatus::Target(t) => t.event_name().unwrap_or("").to_string(),
                        TargetOrStatus::Status => "status".to_string(),
                    })
                    .unwrap_or_default(),
                state: s.state,
                failed: s.state == ServiceState::Failed,
            })
            .collect()
    }

    fn priority_gate_advance(&self, idx: usize, threshold: ServiceState) -> bool {
        let Some(p) = self.services[idx].priority else { return true };
        self.services
            .iter()
            .all(|s| s.priority.map_or(true, |op| op >= p) || s.state >= threshold)
    }

    fn priority_gate_retreat(&self, idx: usize, ceiling: ServiceState) -> bool {
        let Some(p) = self.services[idx].priority else { return true };
        self.services
            .iter()
            .all(|s| s.priority.map_or(true, |op| op <= p) || s.state <= ceiling)
    }

    /// Runs one non-blocking tick: reaps finished script tasks, applies
    /// overrides, launches newly-eligible scripts, and runs due status
    /// checks.
    pub async fn tick(&mut self, is_promoted: bool, runner_state_name: &str) {
        let n = self.services.len();
        for idx in 0..n {
            self.tick_one(idx, is_promoted, runner_state_name).await;
        }
    }

    async fn tick_one(&mut self, idx: usize, is_promoted: bool, runner_state_name: &str) {
        self.reap_if_finished(idx).await;
        self.apply_override_if_needed(idx);
        if self.services[idx].running.is_none() {
            self.maybe_launch_target(idx, is_promoted, runner_state_name);
            self.maybe_launch_status_check(idx, is_promoted, runner_state_name);
        }
    }

    async fn reap_if_finished(&mut self, idx: usize) {
        let done = matches!(&self.services[idx].running, Some((_, h)) if h.is_finished());
        if !done {
            return;
        }
        let (kind, handle) = self.services[idx].running.take().unwrap();
        let outcome = handle.await.unwrap_or(ScriptOutcome::SpawnError("task join failed".into()));
        match kind {
            TargetOrStatus::Target(target) => self.apply_target_outcome(idx, target, outcome),
            TargetOrStatus::Status => self.apply_status_outcome(idx, outcome),
        }
    }

    fn apply_target_outcome(&mut self, idx: usize, target: TargetAction, outcome: ScriptOutcome) {
        let svc = &mut self.services[idx];
        match outcome {
            ScriptOutcome::Success | ScriptOutcome::NotProvided => {
                svc.state = target.settled_state();
            }
            ScriptOutcome::StatusReport(s) => svc.state = s,
            ScriptOutcome::Failure(_) | ScriptOutcome::TimedOut | ScriptOutcome::SpawnError(_) => {
                svc.state = ServiceState::Failed;
            }
        }
    }

    fn apply_status_outcome(&mut self, idx: usize, outcome: ScriptOutcome) {
        let svc = &mut self.services[idx];
        match outcome {
            ScriptOutcome::StatusReport(s) => svc.state = s,
            ScriptOutcome::Failure(_) | ScriptOutcome::TimedOut => svc.state = ServiceState::Failed,
            ScriptOutcome::Success | ScriptOutcome::NotProvided | ScriptOutcome::SpawnError(_) => {}
        }
    }

    /// Spec §4.8 "Overrides": target flips Start→Stop while `Starting`
    /// forces an immediate kill instead of waiting for the script.
    fn apply_override_if_needed(&mut self, idx: usize) {
        let svc = &mut self.services[idx];
        let Some((TargetOrStatus::Target(running_target), handle)) = &svc.running else { return };
        if *running_target == TargetAction::Start
            && svc.target == TargetAction::Stop
            && svc.state == ServiceState::Starting
        {
            handle.abort();
            svc.running = None;
            svc.state = ServiceState::Stopped;
        }
    }

    fn maybe_launch_target(&mut self, idx: usize, is_promoted: bool, runner_state_name: &str) {
        let svc = &self.services[idx];
        let target = svc.target;
        if target.is_resolved(svc.state) {
            return;
        }
        let gate_ok = match target {
            TargetAction::Start => self.priority_gate_advance(idx, ServiceState::Started),
            TargetAction::Promote => self.priority_gate_advance(idx, ServiceState::Promoted),
            TargetAction::Stop => self.priority_gate_retreat(idx, ServiceState::Stopped),
            TargetAction::Demote => self.priority_gate_retreat(idx, ServiceState::Started),
            TargetAction::Fail => true,
        };
        if !gate_ok {
            return;
        }

        let svc = &mut self.services[idx];
        if target == TargetAction::Fail {
            svc.state = ServiceState::Failed;
            return;
        }
        svc.state = target.driving_state();
        let layout = svc.layout.clone();
        let event = target.event_name().expect("non-Fail targets always have an event");
        let timeout = self.config.event_timeout;
        let working_dir = self.config.working_dir.clone();
        let runner_state_name = runner_state_name.to_string();
        let handle = tokio::spawn(async move {
            run_event(&layout, event, timeout, working_dir.as_deref(), is_promoted, &runner_state_name).await
        });
        svc.running = Some((TargetOrStatus::Target(target), handle));
    }

    fn maybe_launch_status_check(&mut self, idx: usize, is_promoted: bool, runner_state_name: &str) {
        let svc = &self.services[idx];
        let due = match svc.last_status_check {
            None => true,
            Some(t) => t.elapsed() >= self.config.status_interval,
        };
        if !due || svc.running.is_some() {
            return;
        }
        let svc = &mut self.services[idx];
        svc.last_status_check = Some(Instant::now());
        let layout = svc.layout.clone();
        let timeout = self.config.event_timeout;
        let working_dir = self.config.working_dir.clone();
        let runner_state_name = runner_state_name.to_string();
        let handle = tokio::spawn(async move {
            run_event(&layout, "status", timeout, working_dir.as_deref(), is_promoted, &runner_state_name).await
        });
        svc.running = Some((TargetOrStatus::Status, handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(name: &str, priority: Option<u8>, state: ServiceState) -> Service {
        Service {
            name: name.to_string(),
            priority,
            layout: ScriptLayout::Directory(PathBuf::from("/nonexistent")),
            state,
            target: TargetAction::Start,
            running: None,
            last_status_check: None,
        }
    }

    fn supervisor_with(services: Vec<Service>) -> Supervisor {
        Supervisor {
            config: SupervisorConfig {
                services_folder: PathBuf::from("/nonexistent"),
                working_dir: None,
                event_timeout: Duration::from_secs(5),
                status_interval: Duration::from_secs(10),
            },
            services,
        }
    }

    #[test]
    fn higher_priority_service_waits_for_lower_priority_to_start() {
        let sup = supervisor_with(vec![svc("infra", Some(0), ServiceState::Stopped), svc("app", Some(99), ServiceState::Stopped)]);
        assert!(!sup.priority_gate_advance(1, ServiceState::Started));
        assert!(sup.priority_gate_advance(0, ServiceState::Started));
    }

    #[test]
    fn higher_priority_must_stop_before_lower_priority_can_stop() {
        let sup = supervisor_with(vec![svc("infra", Some(0), ServiceState::Started), svc("app", Some(99), ServiceState::Started)]);
        assert!(!sup.priority_gate_retreat(0, ServiceState::Stopped));
        assert!(sup.priority_gate_retreat(1, ServiceState::Stopped));
    }

    #[test]
    fn unprioritized_services_ignore_ordering() {
        let sup = supervisor_with(vec![svc("a", None, ServiceState::Stopped), svc("b", None, ServiceState::Stopped)]);
        assert!(sup.priority_gate_advance(0, ServiceState::Started));
        assert!(sup.priority_gate_advance(1, ServiceState::Started));
    }
}
