use std::collections::HashMap;

use koi_proto::NodeId;

/// Per-sender monotonic sequence gate (spec §4.4).
///
/// A message is accepted iff its sequence number is strictly greater than
/// the last one accepted from that sender — except when the sender's
/// embedded uptime has gone backwards, which signals a restart and resets
/// the gate unconditionally.
#[derive(Debug, Default)]
pub struct SequenceFilter {
    last: HashMap<NodeId, SenderState>,
}

#[derive(Debug, Clone, Copy)]
struct SenderState {
    seq: u32,
    uptime_ms: u64,
}

impl SequenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the message should be accepted and delivered.
    pub fn accept(&mut self, sender: NodeId, seq: u32, uptime_ms: u64) -> bool {
        match self.last.get(&sender) {
            None => {
                self.last.insert(sender, SenderState { seq, uptime_ms });
                true
            }
            Some(state) => {
                if uptime_ms < state.uptime_ms {
                    // Restart detected: reset unconditionally.
                    self.last.insert(sender, SenderState { seq, uptime_ms });
                    true
                } else if seq > state.seq {
                    self.last.insert(sender, SenderState { seq, uptime_ms });
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn forget(&mut self, sender: &NodeId) {
        self.last.remove(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_strictly_increasing_sequence() {
        let mut f = SequenceFilter::new();
        let id = NodeId::new_random();
        assert!(f.accept(id, 1, 100));
        assert!(f.accept(id, 2, 200));
        assert!(!f.accept(id, 2, 300)); // duplicate
        assert!(!f.accept(id, 1, 400)); // reordered
        assert!(f.accept(id, 3, 500));
    }

    #[test]
    fn restart_detected_via_uptime_regression_resets_gate() {
        let mut f = SequenceFilter::new();
        let id = NodeId::new_random();
        assert!(f.accept(id, 10, 5_000));
        // Elector restarted: uptime dropped even though seq also reset low.
        assert!(f.accept(id, 1, 50));
        assert!(f.accept(id, 2, 150));
    }

    #[test]
    fn independent_senders_do_not_interfere() {
        let mut f = SequenceFilter::new();
        let a = NodeId::new_random();
        let b = NodeId::new_random();
        assert!(f.accept(a, 1, 0));
        assert!(f.accept(b, 1, 0));
        assert!(f.accept(a, 2, 0));
        assert!(f.accept(b, 2, 0));
    }
}
