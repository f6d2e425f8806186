//! Shared wire-format types for koi: node/endpoint identity and the five
//! message schemas from spec §6, built on [`koi_codec`].

mod endpoint;
mod error;
mod flags;
mod message;
mod node_id;
mod recent_endpoints;
mod value;

pub use endpoint::{Endpoint, EndpointError};
pub use error::{ProtoError, Result};
pub use flags::NodeFlags;
pub use message::{
    Body, HealthReport, HeartBeat, HeartBeatState, MasterInfo, Message, Op, PeerEntry, Request,
    Response, ServiceReportEntry, StateUpdate,
};
pub use node_id::NodeId;
pub use recent_endpoints::RecentEndpoints;
pub use value::Value;

/// Wire-format version (spec §6). A decode that finds a mismatched version
/// is treated as malformed input and rejected.
pub const WIRE_VERSION: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ep() -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 9000)
    }

    #[test]
    fn heartbeat_round_trips() {
        let msg = Message::new(
            7,
            3,
            NodeId::new_random(),
            Body::HeartBeat(HeartBeat {
                name: "node-a".into(),
                flags: NodeFlags::RUNNER.to_wire(),
                state: Some(HeartBeatState {
                    elector_id: NodeId::new_random(),
                    master_id: NodeId::nil(),
                    maintenance: false,
                    peers: vec![PeerEntry {
                        id: NodeId::new_random(),
                        name: "peer-b".into(),
                        last_seen_ms: 123,
                        flags: 0,
                        endpoints: vec![ep()],
                    }],
                }),
            }),
        );
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn health_report_round_trips() {
        let msg = Message::new(
            1,
            3,
            NodeId::new_random(),
            Body::HealthReport(HealthReport {
                name: "runner-1".into(),
                uptime_ms: 50_000,
                state: 5,
                mode: 1,
                maintenance: false,
                service_action: 2,
                services: vec![ServiceReportEntry {
                    name: "web".into(),
                    event: "start".into(),
                    state: 6,
                    failed: false,
                }],
            }),
        );
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn state_update_with_no_master_round_trips() {
        let msg = Message::new(
            2,
            3,
            NodeId::new_random(),
            Body::StateUpdate(StateUpdate { uptime_ms: 10, master_id: NodeId::nil(), master_info: None }),
        );
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn state_update_with_master_round_trips() {
        let msg = Message::new(
            2,
            3,
            NodeId::new_random(),
            Body::StateUpdate(StateUpdate {
                uptime_ms: 10,
                master_id: NodeId::new_random(),
                master_info: Some(MasterInfo { last_seen_ms: 99, name: "m".into(), endpoint: ep() }),
            }),
        );
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn request_and_response_round_trip() {
        let req = Message::new(
            5,
            3,
            NodeId::new_random(),
            Body::Request(Request { cmd: "promote".into(), args: vec!["alpha".into()] }),
        );
        assert_eq!(Message::decode(&req.encode().unwrap()).unwrap(), req);

        let mut resp = Response::default();
        resp.set("ok", Value::Bool(true));
        resp.set("master", Value::Str("alpha".into()));
        let msg = Message::new(6, 3, NodeId::new_random(), Body::Response(resp));
        assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let msg = Message::new(1, 3, NodeId::new_random(), Body::Request(Request { cmd: "x".into(), args: vec![] }));
        let mut bytes = msg.encode().unwrap();
        // archive header is 3 bytes (BigList wrapper); version chunk follows.
        // Corrupt the version's inline SmallInt value.
        bytes[3] = (bytes[3] & 0xF0) | 9;
        assert!(matches!(Message::decode(&bytes), Err(ProtoError::VersionMismatch { .. })));
    }
}
