use std::collections::VecDeque;
use std::time::Instant;

use koi_proto::NodeId;

const FAILURE_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub at: Instant,
    pub name: String,
    pub id: NodeId,
}

/// Ring buffer of the 10 most recent runner-failed-to-Failed transitions
/// (spec §4.6 "Failure log").
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: VecDeque<FailureRecord>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: Instant, name: String, id: NodeId) {
        if self.entries.len() == FAILURE_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(FailureRecord { at, name, id });
    }

    pub fn entries(&self) -> impl Iterator<Item = &FailureRecord> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_ten_and_drops_oldest() {
        let mut log = FailureLog::new();
        let now = Instant::now();
        for i in 0..15u8 {
            let mut bytes = [0u8; 16];
            bytes[15] = i;
            log.push(now, format!("svc-{i}"), NodeId::from_uuid(uuid::Uuid::from_bytes(bytes)));
        }
        assert_eq!(log.entries().count(), FAILURE_LOG_CAPACITY);
        assert_eq!(log.entries().next().unwrap().name, "svc-5");
    }
}
