use std::time::Instant;

use koi_proto::{Body, Endpoint, HeartBeat, HeartBeatState, Message, NodeFlags, NodeId, PeerEntry};

use crate::effect::ClusterEffect;
use crate::observer::ClusterObserver;
use crate::state::{ClusterState, PEER_PRUNE_TIMEOUT};

/// Tick threshold used by every state transition below (spec §4.5).
pub const LIMIT: u64 = 4;

/// The elector-selection role, per spec §4.5. `Servant` is the initial and
/// default role; a node only becomes `Candidate`/`Leader` if configured
/// elector-capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Servant,
    Candidate,
    Leader,
}

/// Drives peer membership and this node's own elector-selection role. Pure
/// in the sense that it never touches a socket: every call returns the
/// [`ClusterEffect`]s the caller (the Nexus) must carry out.
pub struct Cluster {
    pub own_id: NodeId,
    own_name: String,
    cluster_id: u8,
    elector_capable: bool,
    role: Role,
    tick: u64,
    last_seen: u64,
    candidate_time: u64,
    seq: u32,
    state: ClusterState,
}

impl Cluster {
    pub fn new(own_id: NodeId, own_name: String, cluster_id: u8, elector_capable: bool) -> Self {
        Self {
            own_id,
            own_name,
            cluster_id,
            elector_capable,
            role: Role::Servant,
            tick: 0,
            last_seen: 0,
            candidate_time: 0,
            seq: 0,
            state: ClusterState::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn build_heartbeat(&mut self, flags: NodeFlags) -> Message {
        let state = if self.role == Role::Leader {
            Some(HeartBeatState {
                elector_id: self.state.elector_id.unwrap_or(self.own_id),
                master_id: self.state.master_id.unwrap_or(NodeId::nil()),
                maintenance: false,
                peers: self
                    .state
                    .nodes()
                    .map(|n| PeerEntry {
                        id: n.id,
                        name: n.name.clone(),
                        last_seen_ms: 0,
                        flags: n.flags.to_wire(),
                        endpoints: n.endpoints.iter().copied().collect(),
                    })
                    .collect(),
            })
        } else {
            None
        };
        let body = Body::HeartBeat(HeartBeat { name: self.own_name.clone(), flags: flags.to_wire(), state });
        Message::new(self.next_seq(), self.cluster_id, self.own_id, body)
    }

    /// Advances the tick counter by one and runs the state transitions for
    /// the current role (spec §4.5). `now` drives peer staleness pruning,
    /// which is wall-clock based (5s) rather than tick based.
    pub fn update(&mut self, now: Instant, observer: &mut impl ClusterObserver) -> Vec<ClusterEffect> {
        self.tick += 1;
        let t = self.tick;
        let mut effects = Vec::new();

        match self.role {
            Role::Servant => {
                if self.elector_capable && t.saturating_sub(self.last_seen) >= LIMIT {
                    self.transition(Role::Candidate, observer, &mut effects);
                    self.candidate_time = t;
                }
            }
            Role::Candidate => {
                effects.push(ClusterEffect::Broadcast { message: self.build_heartbeat(NodeFlags::LEADER) });
                if t.saturating_sub(self.candidate_time) >= LIMIT {
                    self.transition(Role::Leader, observer, &mut effects);
                }
            }
            Role::Leader => {
                effects.push(ClusterEffect::Broadcast { message: self.build_heartbeat(NodeFlags::LEADER) });
            }
        }

        for id in self.state.prune(now, PEER_PRUNE_TIMEOUT) {
            observer.on_down(id);
            effects.push(ClusterEffect::PeerDown(id));
        }

        effects
    }

    fn transition(&mut self, new_role: Role, observer: &mut impl ClusterObserver, effects: &mut Vec<ClusterEffect>) {
        if new_role == self.role {
            return;
        }
        let old = self.role;
        self.role = new_role;
        observer.on_state_change(old, new_role);
        effects.push(ClusterEffect::RoleChanged(new_role));
        effects.push(if new_role == Role::Leader { ClusterEffect::StartElector } else { ClusterEffect::StopElector });
    }

    /// Handles one inbound heartbeat (spec §4.5 and the peer-table update
    /// rule in the same section).
    pub fn on_heartbeat(
        &mut self,
        from: Endpoint,
        sender_id: NodeId,
        hb: &HeartBeat,
        now: Instant,
        observer: &mut impl ClusterObserver,
    ) -> Vec<ClusterEffect> {
        let mut effects = Vec::new();
        let flags = NodeFlags::from_wire(hb.flags);
        let is_newcomer = self.state.get(&sender_id).is_none();

        let mut endpoints = koi_proto::RecentEndpoints::new();
        endpoints.insert(from);
        self.state.upsert(sender_id, &hb.name, &endpoints, flags, now);
        if is_newcomer {
            observer.on_up(sender_id);
            effects.push(ClusterEffect::PeerUp(sender_id));
        }

        let from_higher_leader = flags.contains(NodeFlags::LEADER) && sender_id.beats(&self.own_id);

        if let Some(state) = &hb.state {
            self.state.master_id = Some(state.master_id);
        }

        match self.role {
            Role::Servant => {
                if from_higher_leader {
                    self.last_seen = self.tick;
                    effects.push(ClusterEffect::Unicast { to: from, message: self.build_heartbeat(NodeFlags::empty()) });
                }
            }
            Role::Candidate | Role::Leader => {
                if from_higher_leader {
                    self.last_seen = self.tick;
                    self.transition(Role::Servant, observer, &mut effects);
                }
            }
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use std::net::{IpAddr, Ipv4Addr};

    fn uuid_from_byte(b: u8) -> NodeId {
        let mut bytes = [0u8; 16];
        bytes[15] = b;
        NodeId::from_uuid(uuid::Uuid::from_bytes(bytes))
    }

    fn ep() -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 9000)
    }

    #[test]
    fn lone_elector_capable_node_becomes_leader_within_two_limits() {
        let mut cluster = Cluster::new(uuid_from_byte(0xFE), "solo".into(), 1, true);
        let mut observer = NullObserver;
        let now = Instant::now();
        for _ in 0..2 * LIMIT {
            cluster.update(now, &mut observer);
        }
        assert_eq!(cluster.role(), Role::Leader);
    }

    #[test]
    fn non_elector_capable_node_stays_servant() {
        let mut cluster = Cluster::new(uuid_from_byte(0x01), "follower".into(), 1, false);
        let mut observer = NullObserver;
        let now = Instant::now();
        for _ in 0..100 {
            cluster.update(now, &mut observer);
        }
        assert_eq!(cluster.role(), Role::Servant);
    }

    #[test]
    fn higher_id_leader_demotes_a_candidate_back_to_servant() {
        let mut cluster = Cluster::new(uuid_from_byte(0x01), "mine".into(), 1, true);
        let mut observer = NullObserver;
        let now = Instant::now();
        for _ in 0..LIMIT {
            cluster.update(now, &mut observer);
        }
        assert_eq!(cluster.role(), Role::Candidate);

        let hb = HeartBeat { name: "big".into(), flags: NodeFlags::LEADER.to_wire(), state: None };
        cluster.on_heartbeat(ep(), uuid_from_byte(0xFE), &hb, now, &mut observer);
        assert_eq!(cluster.role(), Role::Servant);
    }

    #[test]
    fn peer_table_keeps_richer_name_from_before() {
        let mut cluster = Cluster::new(uuid_from_byte(0x01), "mine".into(), 1, true);
        let mut observer = NullObserver;
        let now = Instant::now();
        let hb = HeartBeat { name: "alpha".into(), flags: 0, state: None };
        cluster.on_heartbeat(ep(), uuid_from_byte(0x02), &hb, now, &mut observer);
        let hb2 = HeartBeat { name: "".into(), flags: 0, state: None };
        cluster.on_heartbeat(ep(), uuid_from_byte(0x02), &hb2, now, &mut observer);
        assert_eq!(cluster.state().get(&uuid_from_byte(0x02)).unwrap().name, "alpha");
    }
}
