use std::net::SocketAddr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use koi_cluster::{Cluster, ClusterEffect};
use koi_elector::Elector;
use koi_net::Transport;
use koi_proto::{
    Body, Endpoint, HealthReport, MasterInfo, Message, NodeId, Response, ServiceReportEntry, StateUpdate, Value,
};
use koi_runner::{Runner, RunnerState, ServiceVerdict};
use koi_supervisor::Supervisor;

use crate::config::NexusConfig;
use crate::observer::LoggingObserver;
use crate::rpc::RpcHandler;

struct RunnerBundle {
    runner: Runner,
    supervisor: Supervisor,
}

/// Owns the transport, cluster layer, and optionally one runner and/or
/// elector (spec §4.9). The only component that ever touches a socket.
pub struct Nexus {
    config: NexusConfig,
    transport: Transport,
    cluster: Cluster,
    elector: Option<Elector>,
    runner: Option<RunnerBundle>,
    observer: LoggingObserver,
    rng: StdRng,
    seq: u32,
    started_at: Instant,
    reconfigure_requested: bool,
    last_cluster_tick: Instant,
    last_elector_tick: Instant,
    last_runner_tick: Instant,
    last_state_broadcast: Instant,
}

impl Nexus {
    /// Binds no socket itself — the caller already bound `transport` per
    /// spec §4.9 "On startup: bind socket...". Discovers the services
    /// directory eagerly when this node is runner-capable, since a bad
    /// services folder is a fatal startup error (spec §7).
    pub fn new(config: NexusConfig, transport: Transport, now: Instant) -> anyhow::Result<Self> {
        let cluster = Cluster::new(config.own_id, config.own_name.clone(), config.cluster_id, config.elector_capable);
        let runner = if config.runner_capable {
            let supervisor = Supervisor::discover(config.supervisor.clone())?;
            let runner = Runner::new(config.own_id, config.own_name.clone(), config.runner.clone(), now);
            Some(RunnerBundle { runner, supervisor })
        } else {
            None
        };
        Ok(Self {
            config,
            transport,
            cluster,
            elector: None,
            runner,
            observer: LoggingObserver,
            rng: StdRng::from_entropy(),
            seq: 0,
            started_at: now,
            reconfigure_requested: false,
            last_cluster_tick: now,
            last_elector_tick: now,
            last_runner_tick: now,
            last_state_broadcast: now,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.transport.local_port()
    }

    pub fn role(&self) -> koi_cluster::Role {
        self.cluster.role()
    }

    /// Waits for exactly one inbound datagram and routes it. Kept as a
    /// single method (rather than exposing the transport) so the borrow on
    /// `self.transport` held by the `recv` future ends before dispatch
    /// ever needs `&mut self` as a whole — callers drive this from one arm
    /// of their own `select!` alongside a tick interval and shutdown
    /// signals (spec §5).
    pub async fn recv_and_dispatch(&mut self, buf: &mut [u8], now: Instant) {
        match self.transport.recv(buf).await {
            Ok((n, from)) => self.handle_datagram(&buf[..n], from, now).await,
            Err(e) => tracing::debug!(error = %e, "transient recv failure"),
        }
    }

    /// Drains and clears the "a `reconfigure` RPC arrived" flag; the
    /// binary's main loop owns the actual settings reload (spec §7
    /// "Settings change requiring restart").
    pub fn take_reconfigure_request(&mut self) -> bool {
        std::mem::take(&mut self.reconfigure_requested)
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    async fn send_unicast(&mut self, to: Endpoint, msg: &Message) {
        match koi_net::encode_message(msg, &self.config.password, &mut self.rng) {
            Ok(frame) => {
                if let Err(e) = self.transport.send_unicast(to, &frame).await {
                    tracing::warn!(to = %to, error = %e, "transient send failure");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode outgoing message"),
        }
    }

    async fn broadcast(&mut self, msg: &Message, is_heartbeat: bool) {
        match koi_net::encode_message(msg, &self.config.password, &mut self.rng) {
            Ok(frame) => self.transport.broadcast(&frame, is_heartbeat).await,
            Err(e) => tracing::warn!(error = %e, "failed to encode outgoing broadcast"),
        }
    }

    async fn apply_cluster_effects(&mut self, effects: Vec<ClusterEffect>) {
        for effect in effects {
            match effect {
                ClusterEffect::Unicast { to, message } => self.send_unicast(to, &message).await,
                ClusterEffect::Broadcast { message } => self.broadcast(&message, true).await,
                ClusterEffect::StartElector => {
                    if self.elector.is_none() {
                        self.elector = Some(Elector::new(self.config.elector.clone(), Instant::now()));
                        tracing::info!("elector role acquired");
                    }
                }
                ClusterEffect::StopElector => {
                    if self.elector.take().is_some() {
                        tracing::info!("elector role relinquished");
                    }
                }
                ClusterEffect::PeerUp(id) => tracing::debug!(peer = %id, "peer up effect"),
                ClusterEffect::PeerDown(id) => tracing::debug!(peer = %id, "peer down effect"),
                ClusterEffect::RoleChanged(role) => tracing::debug!(?role, "role changed effect"),
            }
        }
    }

    /// Decodes, authenticates, and routes one inbound datagram by message
    /// kind (spec §4.9 "On receive"). Every failure path drops and logs;
    /// nothing here ever propagates an error (spec §7).
    pub async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr, now: Instant) {
        let from_ep = Endpoint::new(from.ip(), from.port());
        let msg = match koi_net::decode_message(bytes, &self.config.password) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, from = %from_ep, "dropping undecodable datagram");
                return;
            }
        };
        if msg.cluster_id != self.config.cluster_id {
            tracing::debug!(got = msg.cluster_id, expected = self.config.cluster_id, "dropping datagram from foreign cluster");
            return;
        }
        if msg.sender_id == self.config.own_id {
            return;
        }

        match &msg.body {
            Body::HeartBeat(hb) => {
                let effects = self.cluster.on_heartbeat(from_ep, msg.sender_id, hb, now, &mut self.observer);
                self.apply_cluster_effects(effects).await;
            }
            Body::HealthReport(hr) => {
                if let Some(elector) = &mut self.elector {
                    elector.on_health_report(msg.sender_id, hr, now);
                } else {
                    tracing::debug!(from = %msg.sender_id, "ignoring health report, not running an elector");
                }
            }
            Body::StateUpdate(su) => {
                if let Some(bundle) = &mut self.runner {
                    bundle.runner.on_state_update(msg.sender_id, msg.seq, su.uptime_ms, su.master_id, now);
                } else {
                    tracing::debug!(from = %msg.sender_id, "ignoring state update, not running a runner");
                }
            }
            Body::Request(req) => {
                let response = self.dispatch_rpc(&req.cmd, &req.args, now);
                let seq = self.next_seq();
                let out = Message::new(seq, self.config.cluster_id, self.config.own_id, Body::Response(response));
                self.send_unicast(from_ep, &out).await;
            }
            Body::Response(_) => {
                tracing::debug!(from = %msg.sender_id, "ignoring unsolicited response (daemon side has no pending requests)");
            }
        }
    }

    /// Runs due periodic work: cluster tick, elector tick plus state-update
    /// broadcast, runner tick plus health-report broadcast (spec §4.9,
    /// §5 "nexus.update() is the only point where component update()
    /// methods run").
    pub async fn update(&mut self, now: Instant) {
        if now.duration_since(self.last_cluster_tick) >= self.config.cluster_update_interval {
            self.last_cluster_tick = now;
            let effects = self.cluster.update(now, &mut self.observer);
            self.apply_cluster_effects(effects).await;
        }

        self.tick_elector(now).await;
        self.tick_runner(now).await;
    }

    async fn tick_elector(&mut self, now: Instant) {
        if self.elector.is_none() {
            return;
        }
        let peer_count = self.cluster.state().len();
        let mut dirty = false;
        if now.duration_since(self.last_elector_tick) >= self.config.elector.tick_interval {
            self.last_elector_tick = now;
            dirty = self.elector.as_mut().unwrap().tick(now, peer_count);
        }
        let broadcast_due = now.duration_since(self.last_state_broadcast) >= self.config.state_update_interval;
        if dirty || broadcast_due {
            self.last_state_broadcast = now;
            self.broadcast_state_update(now).await;
        }
    }

    async fn broadcast_state_update(&mut self, now: Instant) {
        let Some(elector) = self.elector.as_ref() else { return };
        let master_id = elector.master().unwrap_or(NodeId::nil());
        let uptime_ms = elector.uptime(now).as_millis() as u64;

        let master_info = if master_id.is_nil() {
            None
        } else if master_id == self.config.own_id {
            Some(MasterInfo {
                last_seen_ms: 0,
                name: self.config.own_name.clone(),
                endpoint: Endpoint::new(self.config.advertise_addr, self.config.port),
            })
        } else {
            self.cluster
                .state()
                .get(&master_id)
                .and_then(|node| node.endpoints.preferred().map(|ep| (node.name.clone(), ep)))
                .map(|(name, endpoint)| MasterInfo { last_seen_ms: 0, name, endpoint })
        };

        let seq = self.next_seq();
        let msg = Message::new(
            seq,
            self.config.cluster_id,
            self.config.own_id,
            Body::StateUpdate(StateUpdate { uptime_ms, master_id, master_info }),
        );
        self.broadcast(&msg, false).await;
    }

    async fn tick_runner(&mut self, now: Instant) {
        if self.runner.is_none() {
            return;
        }
        if now.duration_since(self.last_runner_tick) < self.config.runner.tick_interval {
            return;
        }
        self.last_runner_tick = now;

        let quorum_ok = self.cluster.state().quorum_met(self.config.elector.cluster_quorum);

        let health_report = {
            let bundle = self.runner.as_mut().unwrap();
            let is_promoted = bundle.runner.state() == RunnerState::Master;
            bundle.supervisor.tick(is_promoted, bundle.runner.state().name()).await;
            let verdict = ServiceVerdict {
                any_failed: bundle.supervisor.any_failed(),
                promotable: bundle.supervisor.all_started_or_better(),
            };
            bundle.runner.apply_service_verdict(verdict, now);
            bundle.runner.tick_timeouts(now, quorum_ok);
            bundle.runner.tick_recovery(now);

            HealthReport {
                name: bundle.runner.name().to_string(),
                uptime_ms: bundle.runner.uptime(now).as_millis() as u64,
                state: bundle.runner.state().to_wire(),
                mode: 0,
                maintenance: bundle.runner.is_maintenance(),
                service_action: 0,
                services: bundle
                    .supervisor
                    .service_reports()
                    .into_iter()
                    .map(|r| ServiceReportEntry { name: r.name, event: r.event, state: r.state.to_wire(), failed: r.failed })
                    .collect(),
            }
        };

        let seq = self.next_seq();
        let msg = Message::new(seq, self.config.cluster_id, self.config.own_id, Body::HealthReport(health_report));
        self.broadcast(&msg, false).await;
    }

    fn find_other_node(&self, needle: &str) -> Option<NodeId> {
        self.cluster.state().nodes().find(|n| n.name == needle || n.id.to_string() == needle).map(|n| n.id)
    }

    fn redirect_response(&self, id: NodeId) -> Response {
        let mut resp = Response::default();
        if let Some(ep) = self.cluster.state().get(&id).and_then(|n| n.endpoints.preferred()) {
            resp.set("redirect", Value::Str(ep.to_string()));
        } else {
            resp.set("error", Value::Str("target node has no known endpoint".into()));
        }
        resp
    }

    /// Tries the three handler pools in order, auto-redirecting
    /// node-targeted commands first (spec §4.9 "RPC dispatch").
    fn dispatch_rpc(&mut self, cmd: &str, args: &[String], now: Instant) -> Response {
        if matches!(cmd, "start" | "stop" | "recover" | "reconfigure") {
            if let Some(target) = args.first() {
                if let Some(id) = self.find_other_node(target) {
                    return self.redirect_response(id);
                }
            }
        }
        if let Some(r) = self.handle_local(cmd, args, now) {
            return r;
        }
        if let Some(r) = self.handle_elector(cmd, args, now) {
            return r;
        }
        if let Some(r) = self.handle_runner(cmd, args, now) {
            return r;
        }
        let mut resp = Response::default();
        resp.set("error", Value::Str(format!("unknown command '{cmd}' (or role not active on this node)")));
        resp
    }
}

impl RpcHandler for Nexus {
    fn handle_local(&mut self, cmd: &str, _args: &[String], now: Instant) -> Option<Response> {
        match cmd {
            "local" => {
                let mut resp = Response::default();
                resp.set("id", Value::Uuid(self.config.own_id.as_uuid()));
                resp.set("name", Value::Str(self.config.own_name.clone()));
                resp.set("role", Value::Str(format!("{:?}", self.cluster.role())));
                resp.set("uptime_ms", Value::Int(now.duration_since(self.started_at).as_millis() as i64));
                Some(resp)
            }
            "reconfigure" => {
                self.reconfigure_requested = true;
                let mut resp = Response::default();
                resp.set("ok", Value::Bool(true));
                Some(resp)
            }
            _ => None,
        }
    }

    fn handle_elector(&mut self, cmd: &str, args: &[String], now: Instant) -> Option<Response> {
        if !matches!(cmd, "status" | "promote" | "demote" | "elect" | "failures" | "maintenance") {
            return None;
        }
        let elector = self.elector.as_mut()?;
        Some(elector.rpc(cmd, args, now))
    }

    fn handle_runner(&mut self, cmd: &str, _args: &[String], now: Instant) -> Option<Response> {
        let bundle = self.runner.as_mut()?;
        let mut resp = Response::default();
        match cmd {
            "start" => {
                bundle.runner.rpc_start();
                resp.set("ok", Value::Bool(true));
            }
            "stop" => {
                bundle.runner.rpc_stop();
                resp.set("ok", Value::Bool(true));
            }
            "recover" => {
                bundle.runner.rpc_recover(now);
                resp.set("ok", Value::Bool(true));
            }
            "tree" => {
                resp.set(
                    "services",
                    Value::StrList(
                        bundle
                            .supervisor
                            .service_reports()
                            .into_iter()
                            .map(|r| format!("{}:{}", r.name, r.state.to_wire()))
                            .collect(),
                    ),
                );
            }
            _ => return None,
        }
        Some(resp)
    }
}
