use koi_codec::{Decoder, Encoder};

use crate::endpoint::Endpoint;
use crate::error::{ProtoError, Result};
use crate::node_id::NodeId;
use crate::value::Value;
use crate::{WIRE_VERSION};

/// Message kind, carried as a single byte right after the sequence number
/// (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    HealthReport = 0,
    StateUpdate = 1,
    Request = 2,
    Response = 3,
    HeartBeat = 4,
}

impl Op {
    fn from_wire(v: u64) -> Result<Self> {
        Ok(match v {
            0 => Op::HealthReport,
            1 => Op::StateUpdate,
            2 => Op::Request,
            3 => Op::Response,
            4 => Op::HeartBeat,
            other => return Err(ProtoError::BadOp(other)),
        })
    }
}

/// One entry in a heartbeat's embedded peer list (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub id: NodeId,
    pub name: String,
    pub last_seen_ms: i64,
    pub flags: i64,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartBeat {
    pub name: String,
    pub flags: i64,
    pub state: Option<HeartBeatState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartBeatState {
    pub elector_id: NodeId,
    pub master_id: NodeId,
    pub maintenance: bool,
    pub peers: Vec<PeerEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReportEntry {
    pub name: String,
    pub event: String,
    pub state: i64,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub name: String,
    pub uptime_ms: u64,
    pub state: i64,
    pub mode: i64,
    pub maintenance: bool,
    pub service_action: i64,
    pub services: Vec<ServiceReportEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub uptime_ms: u64,
    pub master_id: NodeId,
    pub master_info: Option<MasterInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterInfo {
    pub last_seen_ms: i64,
    pub name: String,
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub cmd: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub fields: Vec<(String, Value)>,
}

impl Response {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.push((key.into(), value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    HealthReport(HealthReport),
    StateUpdate(StateUpdate),
    Request(Request),
    Response(Response),
    HeartBeat(HeartBeat),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: u8,
    pub seq: u32,
    pub cluster_id: u8,
    pub sender_id: NodeId,
    pub body: Body,
}

impl Message {
    pub fn new(seq: u32, cluster_id: u8, sender_id: NodeId, body: Body) -> Self {
        Self { version: WIRE_VERSION, seq, cluster_id, sender_id, body }
    }

    fn op(&self) -> Op {
        match &self.body {
            Body::HealthReport(_) => Op::HealthReport,
            Body::StateUpdate(_) => Op::StateUpdate,
            Body::Request(_) => Op::Request,
            Body::Response(_) => Op::Response,
            Body::HeartBeat(_) => Op::HeartBeat,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut e = Encoder::new();
        e.uint(self.version as u64);
        e.uint(self.seq as u64);
        e.uint(self.op() as u64);
        e.uint(self.cluster_id as u64);
        e.uuid(self.sender_id.as_uuid());
        match &self.body {
            Body::HealthReport(hr) => encode_health_report(&mut e, hr),
            Body::StateUpdate(su) => encode_state_update(&mut e, su),
            Body::Request(r) => encode_request(&mut e, r),
            Body::Response(r) => encode_response(&mut e, r),
            Body::HeartBeat(hb) => encode_heartbeat(&mut e, hb),
        }
        Ok(e.done()?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut d = Decoder::from_archive(bytes)?;
        let version = next(&mut d)?.as_uint()? as u8;
        if version != WIRE_VERSION {
            return Err(ProtoError::VersionMismatch { expected: WIRE_VERSION, got: version });
        }
        let seq = next(&mut d)?.as_uint()? as u32;
        let op = Op::from_wire(next(&mut d)?.as_uint()?)?;
        let cluster_id = next(&mut d)?.as_uint()? as u8;
        let sender_id = NodeId::from(next(&mut d)?.as_uuid()?);
        let body = match op {
            Op::HealthReport => Body::HealthReport(decode_health_report(&mut d)?),
            Op::StateUpdate => Body::StateUpdate(decode_state_update(&mut d)?),
            Op::Request => Body::Request(decode_request(&mut d)?),
            Op::Response => Body::Response(decode_response(&mut d)?),
            Op::HeartBeat => Body::HeartBeat(decode_heartbeat(&mut d)?),
        };
        Ok(Self { version, seq, cluster_id, sender_id, body })
    }
}

fn next<'a>(d: &mut Decoder<'a>) -> Result<koi_codec::Chunk<'a>> {
    Ok(d.next().ok_or(koi_codec::CodecError::Truncated { needed: 1, found: 0 })??)
}

fn encode_heartbeat(e: &mut Encoder, hb: &HeartBeat) {
    e.string(&hb.name);
    e.int32(hb.flags as i32);
    e.bool(hb.state.is_some());
    if let Some(state) = &hb.state {
        e.uuid(state.elector_id.as_uuid());
        e.uuid(state.master_id.as_uuid());
        e.bool(state.maintenance);
        e.uint(state.peers.len() as u64);
        for p in &state.peers {
            e.uuid(p.id.as_uuid());
            e.string(&p.name);
            e.time_ms(p.last_seen_ms);
            e.int32(p.flags as i32);
            let list = e.push_list();
            for ep in &p.endpoints {
                e.bytes(&ep.to_bytes());
            }
            e.pop_list(list).expect("peer endpoint list within size cap");
        }
    }
}

fn decode_heartbeat(d: &mut Decoder) -> Result<HeartBeat> {
    let name = next(d)?.as_str()?.to_string();
    let flags = next(d)?.as_int32()? as i64;
    let has_state = next(d)?.as_bool()?;
    let state = if has_state {
        let elector_id = NodeId::from(next(d)?.as_uuid()?);
        let master_id = NodeId::from(next(d)?.as_uuid()?);
        let maintenance = next(d)?.as_bool()?;
        let n = next(d)?.as_uint()?;
        let mut peers = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let id = NodeId::from(next(d)?.as_uuid()?);
            let name = next(d)?.as_str()?.to_string();
            let last_seen_ms = next(d)?.as_time_ms()?;
            let flags = next(d)?.as_int32()? as i64;
            let list_chunk = next(d)?;
            let mut endpoints = Vec::new();
            for item in list_chunk.items()? {
                endpoints.push(Endpoint::from_bytes(item?.as_bytes_value()?)?);
            }
            peers.push(PeerEntry { id, name, last_seen_ms, flags, endpoints });
        }
        Some(HeartBeatState { elector_id, master_id, maintenance, peers })
    } else {
        None
    };
    Ok(HeartBeat { name, flags, state })
}

fn encode_health_report(e: &mut Encoder, hr: &HealthReport) {
    e.string(&hr.name);
    e.uint(hr.uptime_ms);
    e.int32(hr.state as i32);
    e.int32(hr.mode as i32);
    e.bool(hr.maintenance);
    e.int32(hr.service_action as i32);
    e.uint(hr.services.len() as u64);
    for s in &hr.services {
        e.string(&s.name);
        e.string(&s.event);
        e.int32(s.state as i32);
        e.bool(s.failed);
    }
}

fn decode_health_report(d: &mut Decoder) -> Result<HealthReport> {
    let name = next(d)?.as_str()?.to_string();
    let uptime_ms = next(d)?.as_uint()?;
    let state = next(d)?.as_int32()? as i64;
    let mode = next(d)?.as_int32()? as i64;
    let maintenance = next(d)?.as_bool()?;
    let service_action = next(d)?.as_int32()? as i64;
    let n = next(d)?.as_uint()?;
    let mut services = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let name = next(d)?.as_str()?.to_string();
        let event = next(d)?.as_str()?.to_string();
        let state = next(d)?.as_int32()? as i64;
        let failed = next(d)?.as_bool()?;
        services.push(ServiceReportEntry { name, event, state, failed });
    }
    Ok(HealthReport { name, uptime_ms, state, mode, maintenance, service_action, services })
}

fn encode_state_update(e: &mut Encoder, su: &StateUpdate) {
    e.uint(su.uptime_ms);
    e.uuid(su.master_id.as_uuid());
    if let Some(info) = &su.master_info {
        e.time_ms(info.last_seen_ms);
        e.string(&info.name);
        e.bytes(&info.endpoint.to_bytes());
    }
}

fn decode_state_update(d: &mut Decoder) -> Result<StateUpdate> {
    let uptime_ms = next(d)?.as_uint()?;
    let master_id = NodeId::from(next(d)?.as_uuid()?);
    let master_info = if master_id.is_nil() {
        None
    } else {
        let last_seen_ms = next(d)?.as_time_ms()?;
        let name = next(d)?.as_str()?.to_string();
        let endpoint = Endpoint::from_bytes(next(d)?.as_bytes_value()?)?;
        Some(MasterInfo { last_seen_ms, name, endpoint })
    };
    Ok(StateUpdate { uptime_ms, master_id, master_info })
}

fn encode_request(e: &mut Encoder, r: &Request) {
    e.string(&r.cmd);
    let list = e.push_list();
    for arg in &r.args {
        e.string(arg);
    }
    e.pop_list(list).expect("request args within size cap");
}

fn decode_request(d: &mut Decoder) -> Result<Request> {
    let cmd = next(d)?.as_str()?.to_string();
    let list_chunk = next(d)?;
    let mut args = Vec::new();
    for item in list_chunk.items()? {
        args.push(item?.as_str()?.to_string());
    }
    Ok(Request { cmd, args })
}

const VALUE_BOOL: u64 = 0;
const VALUE_INT: u64 = 1;
const VALUE_STR: u64 = 2;
const VALUE_UUID: u64 = 3;
const VALUE_STRLIST: u64 = 4;
const VALUE_BYTES: u64 = 5;
const VALUE_TIME: u64 = 6;

fn encode_response(e: &mut Encoder, r: &Response) {
    e.uint(r.fields.len() as u64);
    for (k, v) in &r.fields {
        e.string(k);
        match v {
            Value::Bool(b) => {
                e.uint(VALUE_BOOL);
                e.bool(*b);
            }
            Value::Int(i) => {
                e.uint(VALUE_INT);
                e.int32(*i as i32);
            }
            Value::Str(s) => {
                e.uint(VALUE_STR);
                e.string(s);
            }
            Value::Uuid(u) => {
                e.uint(VALUE_UUID);
                e.uuid(*u);
            }
            Value::StrList(list) => {
                e.uint(VALUE_STRLIST);
                let h = e.push_list();
                for s in list {
                    e.string(s);
                }
                e.pop_list(h).expect("response string list within size cap");
            }
            Value::Bytes(b) => {
                e.uint(VALUE_BYTES);
                e.bytes(b);
            }
            Value::PosixTime(t) => {
                e.uint(VALUE_TIME);
                e.time_ms(*t);
            }
        }
    }
}

fn decode_response(d: &mut Decoder) -> Result<Response> {
    let n = next(d)?.as_uint()?;
    let mut fields = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let key = next(d)?.as_str()?.to_string();
        let tag = next(d)?.as_uint()?;
        let value = match tag {
            VALUE_BOOL => Value::Bool(next(d)?.as_bool()?),
            VALUE_INT => Value::Int(next(d)?.as_int32()? as i64),
            VALUE_STR => Value::Str(next(d)?.as_str()?.to_string()),
            VALUE_UUID => Value::Uuid(next(d)?.as_uuid()?),
            VALUE_STRLIST => {
                let chunk = next(d)?;
                let mut list = Vec::new();
                for item in chunk.items()? {
                    list.push(item?.as_str()?.to_string());
                }
                Value::StrList(list)
            }
            VALUE_BYTES => Value::Bytes(next(d)?.as_bytes_value()?.to_vec()),
            VALUE_TIME => Value::PosixTime(next(d)?.as_time_ms()?),
            other => return Err(ProtoError::BadValueTag(other)),
        };
        fields.push((key, value));
    }
    Ok(Response { fields })
}
