use koi_proto::NodeId;

use crate::elect::Role;

/// Cluster change notifications (spec §4.5: "the cluster layer exposes
/// three observer callbacks"). Koi wires exactly one handler per cluster
/// instance, not a list of subscribers — the Nexus is that handler, and
/// uses `on_state_change` to start/stop its embedded elector.
pub trait ClusterObserver {
    fn on_up(&mut self, _id: NodeId) {}
    fn on_down(&mut self, _id: NodeId) {}
    fn on_state_change(&mut self, _old: Role, _new: Role) {}
}

/// An observer that does nothing; used where a caller has no interest in
/// cluster change notifications (e.g. unit tests driving `Cluster` alone).
#[derive(Debug, Default)]
pub struct NullObserver;

impl ClusterObserver for NullObserver {}
