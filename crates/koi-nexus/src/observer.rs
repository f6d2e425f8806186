use koi_cluster::{ClusterObserver, Role};
use koi_proto::NodeId;

/// The Nexus's [`ClusterObserver`]: every callback is a log line, since the
/// Nexus already learns about membership changes through the effect list
/// returned alongside (spec §4.9).
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl ClusterObserver for LoggingObserver {
    fn on_up(&mut self, id: NodeId) {
        tracing::info!(peer = %id, "peer up");
    }

    fn on_down(&mut self, id: NodeId) {
        tracing::info!(peer = %id, "peer down");
    }

    fn on_state_change(&mut self, old: Role, new: Role) {
        tracing::info!(?old, ?new, "elector-selection role changed");
    }
}
