use std::time::Instant;

use koi_proto::{NodeFlags, NodeId, RecentEndpoints};

/// A node as known to the membership layer (spec §3).
#[derive(Debug, Clone)]
pub struct ClusterNode {
    pub id: NodeId,
    pub name: String,
    pub endpoints: RecentEndpoints,
    pub flags: NodeFlags,
    pub last_seen: Instant,
}

impl ClusterNode {
    pub fn new(id: NodeId, name: String, endpoints: RecentEndpoints, flags: NodeFlags, now: Instant) -> Self {
        Self { id, name, endpoints, flags, last_seen: now }
    }

    /// Applies an incoming heartbeat's fields, following the "don't
    /// downgrade information" rule: an empty incoming name never
    /// overwrites a known non-empty name.
    pub fn absorb(&mut self, name: &str, endpoints: &RecentEndpoints, flags: NodeFlags, now: Instant) {
        if !name.is_empty() || self.name.is_empty() {
            self.name = name.to_string();
        }
        self.endpoints.merge(endpoints);
        self.flags = flags;
        self.last_seen = now;
    }

    pub fn is_stale(&self, now: Instant, timeout: std::time::Duration) -> bool {
        now.duration_since(self.last_seen) >= timeout
    }
}
