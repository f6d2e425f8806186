use koi_proto::{Endpoint, Message, NodeId};

/// An action the pure cluster state machine wants performed. The cluster
/// layer never touches a transport directly (spec §3: Nexus exclusively
/// owns the transport); instead each `update`/`on_heartbeat` call returns
/// the effects for the caller to carry out.
#[derive(Debug, Clone)]
pub enum ClusterEffect {
    /// Send `message` to exactly one endpoint (a Servant replying to its
    /// leader, or a Candidate/Leader unicasting to a newly seen peer).
    Unicast { to: Endpoint, message: Message },
    /// Send `message` to the heartbeat multicast group.
    Broadcast { message: Message },
    /// This node should start (or continue running) its embedded elector.
    StartElector,
    /// This node should stop its embedded elector.
    StopElector,
    /// A peer was newly observed.
    PeerUp(NodeId),
    /// A peer was pruned for staleness.
    PeerDown(NodeId),
    /// This node's own role changed (for logging / observer notification).
    RoleChanged(crate::elect::Role),
}
