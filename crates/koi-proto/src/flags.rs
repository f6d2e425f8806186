use bitflags::bitflags;

bitflags! {
    /// Membership flags carried on every heartbeat and stored per
    /// `ClusterNode` (spec §3). At most one node carries `LEADER` in a
    /// given node's local view at any instant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        const ELECTOR = 0b0001;
        const RUNNER  = 0b0010;
        const LEADER  = 0b0100;
        const FAILED  = 0b1000;
    }
}

impl NodeFlags {
    pub fn to_wire(self) -> i64 {
        self.bits() as i64
    }

    pub fn from_wire(v: i64) -> Self {
        Self::from_bits_truncate(v as u32)
    }
}
