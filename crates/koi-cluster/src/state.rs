use std::collections::HashMap;
use std::time::{Duration, Instant};

use koi_proto::{NodeFlags, NodeId, RecentEndpoints};

use crate::node::ClusterNode;

/// Default peer staleness timeout (spec §3): a node prunes a `ClusterNode`
/// it has not seen within this window.
pub const PEER_PRUNE_TIMEOUT: Duration = Duration::from_secs(5);

/// The set of known cluster nodes plus the two designations the cluster
/// layer tracks: who plays the elector role, and who the elector has
/// named master (spec §3).
#[derive(Debug, Default)]
pub struct ClusterState {
    nodes: HashMap<NodeId, ClusterNode>,
    pub elector_id: Option<NodeId>,
    pub master_id: Option<NodeId>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.values()
    }

    pub fn get(&self, id: &NodeId) -> Option<&ClusterNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Upserts a peer by id, applying the "don't downgrade information"
    /// name rule and merging endpoint sets (spec §4.5). If the incoming
    /// flags carry `ELECTOR`, that peer becomes the designated elector.
    pub fn upsert(
        &mut self,
        id: NodeId,
        name: &str,
        endpoints: &RecentEndpoints,
        flags: NodeFlags,
        now: Instant,
    ) -> &ClusterNode {
        if flags.contains(NodeFlags::ELECTOR) {
            self.elector_id = Some(id);
        }
        let entry = self
            .nodes
            .entry(id)
            .or_insert_with(|| ClusterNode::new(id, name.to_string(), RecentEndpoints::new(), NodeFlags::empty(), now));
        entry.absorb(name, endpoints, flags, now);
        entry
    }

    /// Removes any node unseen for `timeout` (default 5s). Returns the ids
    /// removed so the Nexus/cluster layer can fire `on_down`.
    pub fn prune(&mut self, now: Instant, timeout: Duration) -> Vec<NodeId> {
        let stale: Vec<NodeId> =
            self.nodes.values().filter(|n| n.is_stale(now, timeout)).map(|n| n.id).collect();
        for id in &stale {
            self.nodes.remove(id);
            if self.elector_id == Some(*id) {
                self.elector_id = None;
            }
        }
        stale
    }

    pub fn quorum_met(&self, required: usize) -> bool {
        required == 0 || self.len() + 1 >= required // +1 counts self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use koi_proto::Endpoint;

    fn eps() -> RecentEndpoints {
        RecentEndpoints::single(Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 9000))
    }

    #[test]
    fn upsert_keeps_richer_name_on_empty_update() {
        let mut state = ClusterState::new();
        let id = NodeId::new_random();
        let now = Instant::now();
        state.upsert(id, "alpha", &eps(), NodeFlags::empty(), now);
        state.upsert(id, "", &eps(), NodeFlags::empty(), now);
        assert_eq!(state.get(&id).unwrap().name, "alpha");
    }

    #[test]
    fn elector_flag_designates_elector() {
        let mut state = ClusterState::new();
        let id = NodeId::new_random();
        state.upsert(id, "alpha", &eps(), NodeFlags::ELECTOR, Instant::now());
        assert_eq!(state.elector_id, Some(id));
    }

    #[test]
    fn prune_removes_stale_nodes() {
        let mut state = ClusterState::new();
        let id = NodeId::new_random();
        let old = Instant::now() - Duration::from_secs(10);
        state.upsert(id, "alpha", &eps(), NodeFlags::empty(), old);
        let removed = state.prune(Instant::now(), PEER_PRUNE_TIMEOUT);
        assert_eq!(removed, vec![id]);
        assert!(state.is_empty());
    }
}
