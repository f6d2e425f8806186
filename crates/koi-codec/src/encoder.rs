use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::tag::{MAX_BIGLIST_PAYLOAD, MAX_LIST_PAYLOAD, MAX_SMALL_STRING, Tag};

/// Append-only builder for the self-describing wire format.
///
/// Containers are opened with [`Encoder::push_list`], written into like any
/// other chunk, then closed with [`Encoder::pop_list`] which back-patches
/// the now-known length into the placeholder header it left behind.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

/// A handle returned by `push_list`/`push_bytes_container`, identifying the
/// byte offset of the container's placeholder header.
#[derive(Debug, Clone, Copy)]
pub struct ContainerHandle {
    header_at: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.push(Tag::Null.as_nibble() << 4);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(Tag::Bool.as_nibble() << 4);
        self.buf.push(v as u8);
        self
    }

    /// Writes an unsigned integer, auto-narrowing to the smallest encoding
    /// that holds it: inline `SmallInt` (0-15), then `Uint8`, `Uint16`,
    /// finally `Uint64`.
    pub fn uint(&mut self, v: u64) -> &mut Self {
        if v <= 15 {
            self.buf.push((Tag::SmallInt.as_nibble() << 4) | v as u8);
        } else if v <= u8::MAX as u64 {
            self.buf.push(Tag::Uint8.as_nibble() << 4);
            self.buf.push(v as u8);
        } else if v <= u16::MAX as u64 {
            self.buf.push(Tag::Uint16.as_nibble() << 4);
            self.buf.extend_from_slice(&(v as u16).to_be_bytes());
        } else {
            self.buf.push(Tag::Uint64.as_nibble() << 4);
            self.buf.extend_from_slice(&v.to_be_bytes());
        }
        self
    }

    /// Writes a signed 32-bit integer (used for flags/enums that may be
    /// negative, e.g. an unprioritized service's `-1` priority).
    pub fn int32(&mut self, v: i32) -> &mut Self {
        self.buf.push(Tag::Int32.as_nibble() << 4);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Writes milliseconds-since-epoch.
    pub fn time_ms(&mut self, v: i64) -> &mut Self {
        self.buf.push(Tag::PosixTimeMs.as_nibble() << 4);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn uuid(&mut self, v: Uuid) -> &mut Self {
        if v.is_nil() {
            self.buf.push(Tag::NilUuid.as_nibble() << 4);
        } else {
            self.buf.push(Tag::Uuid.as_nibble() << 4);
            self.buf.extend_from_slice(v.as_bytes());
        }
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        if bytes.len() <= MAX_SMALL_STRING {
            self.buf.push((Tag::SmallString.as_nibble() << 4) | bytes.len() as u8);
            self.buf.extend_from_slice(bytes);
        } else {
            self.write_sized_container(Tag::String, bytes);
        }
        self
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.write_sized_container(Tag::RawData, b);
        self
    }

    fn write_sized_container(&mut self, tag: Tag, payload: &[u8]) {
        assert!(payload.len() <= MAX_BIGLIST_PAYLOAD, "payload exceeds 1 MiB cap");
        if payload.len() <= MAX_LIST_PAYLOAD {
            self.buf.push((tag.as_nibble() << 4) | ((payload.len() >> 8) as u8 & 0x0F));
            self.buf.push((payload.len() & 0xFF) as u8);
        } else {
            // Only List/BigList use the 20-bit form; String/RawData cap at
            // MAX_LIST_PAYLOAD by spec, so this branch is List/BigList only.
            unreachable!("String/RawData must stay within the 12-bit size form");
        }
        self.buf.extend_from_slice(payload);
    }

    /// Opens a nested list container, returning a handle to close with
    /// [`Encoder::pop_list`]. Reserves a 2-byte placeholder header
    /// (`List` form); `pop_list` upgrades it to the 3-byte `BigList` form
    /// in place if the payload turns out to exceed 4095 bytes.
    pub fn push_list(&mut self) -> ContainerHandle {
        let header_at = self.buf.len();
        self.buf.push(0); // placeholder tag+size-high byte
        self.buf.push(0); // placeholder size-low byte
        ContainerHandle { header_at }
    }

    /// Closes a container opened with [`Encoder::push_list`], back-patching
    /// its header with the now-known payload length.
    pub fn pop_list(&mut self, handle: ContainerHandle) -> Result<()> {
        let payload_start = handle.header_at + 2;
        let payload_len = self.buf.len() - payload_start;
        if payload_len > MAX_BIGLIST_PAYLOAD {
            return Err(CodecError::SizeOverflow { len: payload_len });
        }
        if payload_len <= MAX_LIST_PAYLOAD {
            self.buf[handle.header_at] =
                (Tag::List.as_nibble() << 4) | ((payload_len >> 8) as u8 & 0x0F);
            self.buf[handle.header_at + 1] = (payload_len & 0xFF) as u8;
        } else {
            // Upgrade to BigList: insert one extra size byte before the payload.
            let extra = [0u8];
            self.buf.splice(payload_start..payload_start, extra);
            self.buf[handle.header_at] =
                (Tag::BigList.as_nibble() << 4) | ((payload_len >> 16) as u8 & 0x0F);
            self.buf[handle.header_at + 1] = ((payload_len >> 8) & 0xFF) as u8;
            self.buf[handle.header_at + 2] = (payload_len & 0xFF) as u8;
        }
        Ok(())
    }

    /// Seals the archive: the whole buffer becomes one top-level `BigList`,
    /// per spec ("an encoded archive is itself wrapped in a BigList").
    pub fn done(self) -> Result<Vec<u8>> {
        let payload_len = self.buf.len();
        if payload_len > MAX_BIGLIST_PAYLOAD {
            return Err(CodecError::SizeOverflow { len: payload_len });
        }
        let mut out = Vec::with_capacity(payload_len + 3);
        out.push((Tag::BigList.as_nibble() << 4) | ((payload_len >> 16) as u8 & 0x0F));
        out.push(((payload_len >> 8) & 0xFF) as u8);
        out.push((payload_len & 0xFF) as u8);
        out.extend_from_slice(&self.buf);
        Ok(out)
    }

    /// Raw accessor for embedding an already-built sub-archive unmodified.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.buf
    }
}
