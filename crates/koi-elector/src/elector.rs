use std::collections::HashMap;
use std::time::{Duration, Instant};

use koi_proto::{HealthReport, NodeId, Response, Value};

use crate::config::ElectorConfig;
use crate::failure::FailureLog;
use crate::record::{RunnerRecord, RunnerState};

/// Master election, quorum enforcement and runner health tracking (spec
/// §4.6). Owns no transport; the Nexus feeds it `HealthReport`s and reads
/// back its tick output to build outgoing `StateUpdate`s.
pub struct Elector {
    config: ElectorConfig,
    started_at: Instant,
    runners: HashMap<NodeId, RunnerRecord>,
    master: Option<NodeId>,
    manual_target: Option<NodeId>,
    manual_mode: bool,
    maintenance: bool,
    failures: FailureLog,
}

impl Elector {
    pub fn new(config: ElectorConfig, now: Instant) -> Self {
        Self {
            config,
            started_at: now,
            runners: HashMap::new(),
            master: None,
            manual_target: None,
            manual_mode: false,
            maintenance: false,
            failures: FailureLog::new(),
        }
    }

    pub fn master(&self) -> Option<NodeId> {
        self.master
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.duration_since(self.started_at)
    }

    pub fn runner(&self, id: &NodeId) -> Option<&RunnerRecord> {
        self.runners.get(id)
    }

    pub fn on_health_report(&mut self, id: NodeId, report: &HealthReport, now: Instant) {
        self.runners
            .entry(id)
            .and_modify(|r| r.absorb_report(report, now))
            .or_insert_with(|| RunnerRecord::from_report(id, report, now));
    }

    fn has_quorum(&self, cluster_peers: usize) -> bool {
        self.config.cluster_quorum == 0 || cluster_peers >= self.config.cluster_quorum
    }

    /// Runs the five-step pipeline in order (spec §4.6) and returns whether
    /// the master choice changed (OR-accumulated across every step — the
    /// source's assignment-override pattern silently drops an earlier
    /// `true`, which the spec calls out as unintentional).
    pub fn tick(&mut self, now: Instant, cluster_peers: usize) -> bool {
        let mut dirty = false;
        dirty |= self.step_repromote();
        self.step_health_sweep(now);
        dirty |= self.step_master_health(cluster_peers);
        dirty |= self.step_election(now, cluster_peers);
        self.step_forget_ancient(now);
        dirty
    }

    fn step_repromote(&mut self) -> bool {
        if self.master.is_some() || self.manual_target.is_some() || self.manual_mode {
            return false;
        }
        if let Some(r) = self.runners.values().find(|r| r.state > RunnerState::Slave) {
            self.master = Some(r.id);
            return true;
        }
        false
    }

    fn step_health_sweep(&mut self, now: Instant) {
        let uptime_ok = self.uptime(now) > self.config.initial_promotion_delay;
        for runner in self.runners.values_mut() {
            if uptime_ok && now.duration_since(runner.last_seen) >= self.config.master_dead_time {
                runner.state = RunnerState::Disconnected;
            }
            if runner.any_service_failed {
                runner.state = RunnerState::Failed;
            }
        }
        let failed: Vec<(NodeId, String)> = self
            .runners
            .values()
            .filter(|r| r.state == RunnerState::Failed)
            .map(|r| (r.id, r.name.clone()))
            .collect();
        for (id, name) in failed {
            self.failures.push(now, name, id);
        }
    }

    fn step_master_health(&mut self, cluster_peers: usize) -> bool {
        let Some(master_id) = self.master else { return false };
        let unhealthy = match self.runners.get(&master_id) {
            Some(r) => r.state <= RunnerState::Stopped || r.mode == crate::record::RunnerMode::Passive,
            None => true,
        };
        if unhealthy || !self.has_quorum(cluster_peers) {
            self.master = None;
            true
        } else {
            false
        }
    }

    fn step_election(&mut self, now: Instant, cluster_peers: usize) -> bool {
        if self.any_service_promoted_or_promoting()
            || self.runners.is_empty()
            || self.master.is_some()
            || self.manual_mode
            || !self.has_quorum(cluster_peers)
            || self.uptime(now) < self.config.initial_promotion_delay
        {
            return false;
        }

        if let Some(target) = self.manual_target {
            match self.runners.get(&target) {
                Some(r) if r.state > RunnerState::Stopped => {
                    self.master = Some(target);
                    return true;
                }
                _ => {
                    self.manual_target = None;
                }
            }
        }

        let mut candidates: Vec<&RunnerRecord> = self
            .runners
            .values()
            .filter(|r| {
                r.state > RunnerState::Stopped
                    && r.mode == crate::record::RunnerMode::Active
                    && r.failure_age(now) >= self.config.runner_failure_promotion_timeout
            })
            .collect();
        if candidates.is_empty() {
            candidates = self
                .runners
                .values()
                .filter(|r| r.state > RunnerState::Stopped && r.mode == crate::record::RunnerMode::Active)
                .collect();
        }
        if candidates.is_empty() {
            return false;
        }
        candidates.sort_by(|a, b| b.uptime.cmp(&a.uptime).then(a.last_seen.cmp(&b.last_seen)));
        let chosen =
            candidates.iter().find(|r| r.state.is_promoted()).or_else(|| candidates.first()).unwrap();
        self.master = Some(chosen.id);
        true
    }

    fn step_forget_ancient(&mut self, now: Instant) {
        self.runners
            .retain(|_, r| !(r.is_terminal() && now.duration_since(r.last_seen) >= self.config.forget_ancient_time));
    }

    fn any_service_promoted_or_promoting(&self) -> bool {
        self.runners.values().any(|r| r.any_service_promoted_or_promoting)
    }

    pub fn rpc(&mut self, cmd: &str, args: &[String], now: Instant) -> Response {
        match cmd {
            "status" => self.rpc_status(now),
            "promote" => self.rpc_promote(args),
            "demote" => self.rpc_demote(),
            "elect" => self.rpc_elect(),
            "failures" => self.rpc_failures(),
            "maintenance" => self.rpc_maintenance(args),
            other => {
                let mut resp = Response::default();
                resp.set("error", Value::Str(format!("unknown elector command '{other}'")));
                resp
            }
        }
    }

    fn rpc_status(&self, now: Instant) -> Response {
        let mut resp = Response::default();
        resp.set("uptime_ms", Value::Int(self.uptime(now).as_millis() as i64));
        resp.set("manual_mode", Value::Bool(self.manual_mode));
        resp.set("maintenance", Value::Bool(self.maintenance));
        resp.set("master", Value::Uuid(self.master.unwrap_or(NodeId::nil()).as_uuid()));
        resp.set("runners", Value::StrList(self.runners.values().map(|r| r.name.clone()).collect()));
        resp
    }

    fn rpc_promote(&mut self, args: &[String]) -> Response {
        let mut resp = Response::default();
        let Some(target) = args.first() else {
            resp.set("error", Value::Str("promote requires a name or id".into()));
            return resp;
        };
        let found = self
            .runners
            .values()
            .find(|r| r.name == *target || r.id.to_string() == *target)
            .map(|r| r.id);
        match found {
            Some(id) => {
                self.manual_target = Some(id);
                self.manual_mode = false;
                resp.set("ok", Value::Bool(true));
            }
            None => {
                resp.set("error", Value::Str(format!("unknown runner '{target}'")));
            }
        }
        resp
    }

    fn rpc_demote(&mut self) -> Response {
        self.manual_mode = true;
        self.master = None;
        self.manual_target = None;
        let mut resp = Response::default();
        resp.set("ok", Value::Bool(true));
        resp
    }

    fn rpc_elect(&mut self) -> Response {
        self.manual_mode = false;
        let mut resp = Response::default();
        resp.set("ok", Value::Bool(true));
        resp
    }

    fn rpc_failures(&self) -> Response {
        let mut resp = Response::default();
        resp.set(
            "failures",
            Value::StrList(self.failures.entries().map(|f| format!("{}:{}", f.name, f.id)).collect()),
        );
        resp
    }

    fn rpc_maintenance(&mut self, args: &[String]) -> Response {
        let mut resp = Response::default();
        match args.first().map(String::as_str) {
            Some("on") => {
                self.maintenance = true;
                resp.set("ok", Value::Bool(true));
            }
            Some("off") => {
                self.maintenance = false;
                resp.set("ok", Value::Bool(true));
            }
            _ => {
                resp.set("error", Value::Str("maintenance requires 'on' or 'off'".into()));
            }
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koi_proto::ServiceReportEntry;

    fn id(b: u8) -> NodeId {
        let mut bytes = [0u8; 16];
        bytes[15] = b;
        NodeId::from_uuid(uuid::Uuid::from_bytes(bytes))
    }

    fn report(state: i64, uptime_ms: u64) -> HealthReport {
        HealthReport {
            name: "alpha".into(),
            uptime_ms,
            state,
            mode: 0,
            maintenance: false,
            service_action: 0,
            services: vec![],
        }
    }

    fn config() -> ElectorConfig {
        ElectorConfig {
            tick_interval: Duration::from_secs(1),
            master_dead_time: Duration::from_secs(10),
            initial_promotion_delay: Duration::from_millis(0),
            runner_failure_promotion_timeout: Duration::from_secs(60),
            forget_ancient_time: Duration::from_secs(30 * 60),
            cluster_quorum: 0,
        }
    }

    #[test]
    fn elects_sole_active_runner_once_above_stopped() {
        let mut e = Elector::new(config(), Instant::now() - Duration::from_secs(20));
        let now = Instant::now();
        e.on_health_report(id(1), &report(RunnerState::Slave.to_wire(), 20_000), now);
        let dirty = e.tick(now, 1);
        assert!(dirty);
        assert_eq!(e.master(), Some(id(1)));
    }

    #[test]
    fn passive_runner_is_never_elected() {
        let mut e = Elector::new(config(), Instant::now() - Duration::from_secs(20));
        let now = Instant::now();
        let mut passive = report(RunnerState::Slave.to_wire(), 20_000);
        passive.mode = 1;
        e.on_health_report(id(2), &passive, now);
        e.tick(now, 1);
        assert_eq!(e.master(), None);
    }

    #[test]
    fn manual_demote_then_elect_cycle() {
        let mut e = Elector::new(config(), Instant::now() - Duration::from_secs(20));
        let now = Instant::now();
        e.on_health_report(id(1), &report(RunnerState::Slave.to_wire(), 20_000), now);
        e.tick(now, 1);
        assert_eq!(e.master(), Some(id(1)));

        e.rpc("demote", &[], now);
        assert_eq!(e.master(), None);
        e.tick(now, 1);
        assert_eq!(e.master(), None, "manual mode blocks automatic election");

        e.rpc("elect", &[], now);
        e.tick(now, 1);
        assert_eq!(e.master(), Some(id(1)));
    }

    #[test]
    fn failed_service_flags_runner_failed_on_sweep() {
        let mut e = Elector::new(config(), Instant::now() - Duration::from_secs(20));
        let now = Instant::now();
        let mut r = report(RunnerState::Live.to_wire(), 20_000);
        r.services = vec![ServiceReportEntry { name: "web".into(), event: "status".into(), state: 0, failed: true }];
        e.on_health_report(id(3), &r, now);
        e.tick(now, 1);
        assert_eq!(e.runner(&id(3)).unwrap().state, RunnerState::Failed);
    }
}
