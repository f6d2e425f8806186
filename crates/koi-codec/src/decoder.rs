use uuid::Uuid;

use crate::error::{CodecError, Result};
use crate::tag::Tag;

/// One decoded chunk: a tag plus a borrowed slice of its payload bytes.
///
/// For primitive tags the payload is the raw value bytes; for `List` and
/// `BigList` it is the nested archive body, walked with [`Chunk::items`].
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    tag: Tag,
    inline: u8,
    body: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    fn expect(&self, expected: Tag) -> Result<()> {
        if self.tag == expected {
            Ok(())
        } else {
            Err(CodecError::TypeMismatch { expected: expected.name(), actual: self.tag.name() })
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.expect(Tag::Bool)?;
        Ok(self.body[0] != 0)
    }

    /// Reads any integer-bearing tag (`SmallInt`/`Uint8`/`Uint16`/`Uint64`)
    /// as a `u64`, so callers don't need to know which width the encoder
    /// narrowed to.
    pub fn as_uint(&self) -> Result<u64> {
        Ok(match self.tag {
            Tag::SmallInt => self.inline as u64,
            Tag::Uint8 => self.body[0] as u64,
            Tag::Uint16 => u16::from_be_bytes(self.body.try_into().unwrap()) as u64,
            Tag::Uint64 => u64::from_be_bytes(self.body.try_into().unwrap()),
            other => {
                return Err(CodecError::TypeMismatch { expected: "uint", actual: other.name() });
            }
        })
    }

    pub fn as_int32(&self) -> Result<i32> {
        self.expect(Tag::Int32)?;
        Ok(i32::from_be_bytes(self.body.try_into().unwrap()))
    }

    pub fn as_time_ms(&self) -> Result<i64> {
        self.expect(Tag::PosixTimeMs)?;
        Ok(i64::from_be_bytes(self.body.try_into().unwrap()))
    }

    pub fn as_uuid(&self) -> Result<Uuid> {
        match self.tag {
            Tag::NilUuid => Ok(Uuid::nil()),
            Tag::Uuid => Ok(Uuid::from_slice(self.body).map_err(|_| CodecError::Truncated {
                needed: 16,
                found: self.body.len(),
            })?),
            other => Err(CodecError::TypeMismatch { expected: "uuid", actual: other.name() }),
        }
    }

    pub fn as_str(&self) -> Result<&'a str> {
        match self.tag {
            Tag::String | Tag::SmallString => {
                std::str::from_utf8(self.body).map_err(|_| CodecError::InvalidUtf8)
            }
            other => Err(CodecError::TypeMismatch { expected: "string", actual: other.name() }),
        }
    }

    pub fn as_bytes_value(&self) -> Result<&'a [u8]> {
        self.expect(Tag::RawData)?;
        Ok(self.body)
    }

    /// Walks a `List`/`BigList` chunk's contents as a nested archive.
    pub fn items(&self) -> Result<Decoder<'a>> {
        match self.tag {
            Tag::List | Tag::BigList => Ok(Decoder::new(self.body)),
            other => Err(CodecError::TypeMismatch { expected: "list", actual: other.name() }),
        }
    }
}

/// Iterator-style cursor over a byte slice of encoded chunks.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Strips the top-level `BigList` archive wrapper and returns a decoder
    /// over its contents.
    pub fn from_archive(data: &'a [u8]) -> Result<Decoder<'a>> {
        let mut outer = Decoder::new(data);
        let chunk = outer
            .next()
            .ok_or(CodecError::Truncated { needed: 3, found: data.len() })??;
        chunk.items()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(CodecError::Truncated { needed: n, found: self.data.len() - self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_one(&mut self) -> Result<Chunk<'a>> {
        let header = self.take(1)?[0];
        let tag = Tag::try_from(header >> 4)?;
        let nibble = header & 0x0F;
        let (inline, body) = match tag {
            Tag::Null | Tag::NilUuid => (0, &[][..]),
            Tag::Bool => (0, self.take(1)?),
            Tag::SmallInt => (nibble, &[][..]),
            Tag::Uint8 => (0, self.take(1)?),
            Tag::Uint16 => (0, self.take(2)?),
            Tag::Int32 => (0, self.take(4)?),
            Tag::Uint64 => (0, self.take(8)?),
            Tag::PosixTimeMs => (0, self.take(8)?),
            Tag::Uuid => (0, self.take(16)?),
            Tag::SmallString => (0, self.take(nibble as usize)?),
            Tag::String | Tag::RawData | Tag::List => {
                let low = self.take(1)?[0];
                let len = ((nibble as usize) << 8) | low as usize;
                (0, self.take(len)?)
            }
            Tag::BigList => {
                let rest = self.take(2)?;
                let len = ((nibble as usize) << 16) | ((rest[0] as usize) << 8) | rest[1] as usize;
                (0, self.take(len)?)
            }
        };
        Ok(Chunk { tag, inline, body })
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        Some(self.read_one())
    }
}
