use std::time::Instant;

use koi_proto::Response;

/// One of the three handler pools tried in order by [`crate::Nexus`]'s RPC
/// dispatch (spec §4.9 "RPC dispatch"): local, elector-only, runner-only.
/// Mirrors the teacher's single-trait, default-no-op handler shape (see
/// `koi-cluster::ClusterObserver`), selectively overridden per pool.
pub trait RpcHandler {
    fn handle_local(&mut self, _cmd: &str, _args: &[String], _now: Instant) -> Option<Response> {
        None
    }

    fn handle_elector(&mut self, _cmd: &str, _args: &[String], _now: Instant) -> Option<Response> {
        None
    }

    fn handle_runner(&mut self, _cmd: &str, _args: &[String], _now: Instant) -> Option<Response> {
        None
    }
}
