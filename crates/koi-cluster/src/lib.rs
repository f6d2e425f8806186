//! Peer membership and elector-role self-election (spec §3, §4.5).

mod effect;
mod elect;
mod node;
mod observer;
mod state;

pub use effect::ClusterEffect;
pub use elect::{Cluster, Role, LIMIT};
pub use node::ClusterNode;
pub use observer::{ClusterObserver, NullObserver};
pub use state::{ClusterState, PEER_PRUNE_TIMEOUT};
