use uuid::Uuid;

/// Heterogeneous value carried in an RPC [`crate::message::Response`] map
/// (spec §9 "dynamic-typed response map").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Uuid(Uuid),
    StrList(Vec<String>),
    Bytes(Vec<u8>),
    PosixTime(i64),
}

impl Value {
    /// Renders the value for human display (status dumps, CLI output).
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::Uuid(u) => u.to_string(),
            Value::StrList(l) => l.join(", "),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::PosixTime(t) => t.to_string(),
        }
    }
}
