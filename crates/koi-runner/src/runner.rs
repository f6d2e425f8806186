use std::time::{Duration, Instant};

use koi_net::SequenceFilter;
use koi_proto::NodeId;

use crate::config::RunnerConfig;
use crate::state::{RunnerState, ServiceVerdict};

/// Per-node service-runner state machine (spec §4.7). Owns no transport;
/// the Nexus feeds it `StateUpdate`s and supervisor verdicts, and reads
/// back its state to build outgoing `HealthReport`s.
pub struct Runner {
    pub own_id: NodeId,
    name: String,
    config: RunnerConfig,
    started_at: Instant,
    state: RunnerState,
    enabled: bool,
    maintenance: bool,
    failcount: u32,
    last_transition: Instant,
    last_failure_at: Option<Instant>,
    elector_id: Option<NodeId>,
    elector_last_seen: Option<Instant>,
    demote_scheduled: bool,
    quorum_lost_since: Option<Instant>,
    seq_filter: SequenceFilter,
}

impl Runner {
    pub fn new(own_id: NodeId, name: String, config: RunnerConfig, now: Instant) -> Self {
        Self {
            own_id,
            name,
            config,
            started_at: now,
            state: RunnerState::Disconnected,
            enabled: true,
            maintenance: false,
            failcount: 0,
            last_transition: now,
            last_failure_at: None,
            elector_id: None,
            elector_last_seen: None,
            demote_scheduled: false,
            quorum_lost_since: None,
            seq_filter: SequenceFilter::new(),
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.duration_since(self.started_at)
    }

    fn transition_to(&mut self, new_state: RunnerState, now: Instant) {
        if new_state == self.state {
            return;
        }
        self.state = new_state;
        self.last_transition = now;
        if new_state == RunnerState::Failed {
            self.last_failure_at = Some(now);
        }
    }

    /// Accepts (or drops, per sequence discipline) an inbound `StateUpdate`
    /// and applies the elector-directive transition rule (spec §4.7).
    pub fn on_state_update(
        &mut self,
        elector_id: NodeId,
        seq: u32,
        elector_uptime_ms: u64,
        master_id: NodeId,
        now: Instant,
    ) -> bool {
        if !self.seq_filter.accept(elector_id, seq, elector_uptime_ms) {
            return false;
        }
        self.elector_id = Some(elector_id);
        self.elector_last_seen = Some(now);

        if !self.enabled && self.state != RunnerState::Failed && self.state != RunnerState::Stopped {
            self.transition_to(RunnerState::Stopped, now);
        } else if master_id == self.own_id && self.state >= RunnerState::Stopped {
            if self.state < RunnerState::Live {
                self.transition_to(RunnerState::Live, now);
            } else {
                self.transition_to(RunnerState::Master, now);
            }
        } else if !master_id.is_nil() && master_id != self.own_id && self.state > RunnerState::Slave {
            self.transition_to(RunnerState::Slave, now);
        } else if self.state == RunnerState::Live || self.state == RunnerState::Slave {
            // stay
        } else if self.state >= RunnerState::Disconnected {
            self.transition_to(RunnerState::Live, now);
        }
        true
    }

    /// Applies the supervisor's per-tick service verdict (spec §4.7
    /// "Service verdict").
    pub fn apply_service_verdict(&mut self, verdict: ServiceVerdict, now: Instant) {
        if verdict.any_failed {
            self.transition_to(RunnerState::Failed, now);
        } else if self.state == RunnerState::Live && verdict.promotable {
            self.transition_to(RunnerState::Slave, now);
        } else if self.state > RunnerState::Live && !verdict.promotable {
            self.transition_to(RunnerState::Live, now);
        }
    }

    /// Timeouts and quorum-loss demotion (spec §4.7 "Timeouts").
    pub fn tick_timeouts(&mut self, now: Instant, quorum_ok: bool) {
        if let Some(seen) = self.elector_last_seen {
            let unseen_for = now.duration_since(seen);
            if unseen_for >= self.config.elector_lost_time && self.state == RunnerState::Master {
                self.demote_scheduled = true;
                tracing::warn!(runner = %self.name, "elector unseen beyond elector_lost_time");
            }
            if unseen_for >= self.config.elector_gone_time && self.state == RunnerState::Master {
                self.transition_to(RunnerState::Slave, now);
                self.demote_scheduled = false;
            }
        }

        if self.state == RunnerState::Master {
            if quorum_ok {
                self.quorum_lost_since = None;
            } else {
                let since = *self.quorum_lost_since.get_or_insert(now);
                if now.duration_since(since) >= self.config.quorum_demote_time {
                    self.transition_to(RunnerState::Slave, now);
                    self.quorum_lost_since = None;
                }
            }
        }
    }

    /// Recovery backoff (spec §4.7 "Recovery backoff"): re-tries leaving
    /// `Failed` on an exponentially widening schedule, factor clamped to
    /// `[1, 8]`, capped at `auto_recover` attempts.
    pub fn tick_recovery(&mut self, now: Instant) {
        if self.state == RunnerState::Failed && self.failcount < self.config.auto_recover {
            let factor = self.config.clamped_factor().powi(self.failcount as i32);
            let wait = self.config.auto_recover_time.mul_f64(factor);
            if now.duration_since(self.last_transition) > wait {
                self.failcount += 1;
                self.transition_to(RunnerState::Disconnected, now);
            }
        }
        if let Some(t) = self.last_failure_at {
            if now.duration_since(t) > self.config.failcount_reset_time {
                self.failcount = 0;
            }
        }
    }

    pub fn rpc_start(&mut self) {
        self.enabled = true;
    }

    pub fn rpc_stop(&mut self) {
        self.enabled = false;
    }

    pub fn rpc_recover(&mut self, now: Instant) {
        self.failcount = 0;
        if self.state == RunnerState::Failed {
            self.transition_to(RunnerState::Disconnected, now);
        }
    }

    pub fn is_maintenance(&self) -> bool {
        self.maintenance
    }

    pub fn set_maintenance(&mut self, on: bool) {
        self.maintenance = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> NodeId {
        let mut bytes = [0u8; 16];
        bytes[15] = b;
        NodeId::from_uuid(uuid::Uuid::from_bytes(bytes))
    }

    #[test]
    fn elector_naming_self_master_promotes_through_live() {
        let now = Instant::now();
        let mut r = Runner::new(id(1), "alpha".into(), RunnerConfig::default(), now);
        assert!(r.on_state_update(id(9), 1, 1000, id(1), now));
        assert_eq!(r.state(), RunnerState::Live);
        assert!(r.on_state_update(id(9), 2, 2000, id(1), now));
        assert_eq!(r.state(), RunnerState::Master);
    }

    #[test]
    fn out_of_order_sequence_is_dropped() {
        let now = Instant::now();
        let mut r = Runner::new(id(1), "alpha".into(), RunnerConfig::default(), now);
        assert!(r.on_state_update(id(9), 5, 1000, NodeId::nil(), now));
        assert!(!r.on_state_update(id(9), 5, 1100, NodeId::nil(), now));
        assert!(!r.on_state_update(id(9), 3, 900, NodeId::nil(), now));
    }

    #[test]
    fn naming_another_runner_demotes_to_slave() {
        let now = Instant::now();
        let mut r = Runner::new(id(1), "alpha".into(), RunnerConfig::default(), now);
        r.on_state_update(id(9), 1, 1000, id(1), now);
        r.on_state_update(id(9), 2, 2000, id(1), now);
        assert_eq!(r.state(), RunnerState::Master);
        r.on_state_update(id(9), 3, 3000, id(2), now);
        assert_eq!(r.state(), RunnerState::Slave);
    }

    #[test]
    fn recovery_backoff_gaps_are_non_decreasing() {
        let mut now = Instant::now();
        let mut config = RunnerConfig::default();
        config.auto_recover = 3;
        config.auto_recover_time = Duration::from_secs(10);
        config.auto_recover_wait_factor = 2.0;
        let mut r = Runner::new(id(1), "alpha".into(), config, now);
        r.apply_service_verdict(ServiceVerdict { any_failed: true, promotable: false }, now);
        assert_eq!(r.state(), RunnerState::Failed);

        now += Duration::from_secs(11);
        r.tick_recovery(now);
        assert_eq!(r.state(), RunnerState::Disconnected);
        assert_eq!(r.failcount, 1);

        r.apply_service_verdict(ServiceVerdict { any_failed: true, promotable: false }, now);
        let first_retry_at = now;
        now += Duration::from_secs(21);
        r.tick_recovery(now);
        assert_eq!(r.state(), RunnerState::Disconnected);
        assert_eq!(r.failcount, 2);
        assert!(now.duration_since(first_retry_at) >= Duration::from_secs(20));
    }

    #[test]
    fn stop_rpc_drives_to_stopped_on_next_update() {
        let now = Instant::now();
        let mut r = Runner::new(id(1), "alpha".into(), RunnerConfig::default(), now);
        r.on_state_update(id(9), 1, 1000, id(1), now);
        r.rpc_stop();
        r.on_state_update(id(9), 2, 2000, NodeId::nil(), now);
        assert_eq!(r.state(), RunnerState::Stopped);
    }
}
