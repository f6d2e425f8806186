use crate::error::CodecError;

/// The fifteen value kinds the wire format can carry, plus one reserved
/// nibble held back for future extension (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Null = 0,
    Bool = 1,
    SmallInt = 2,
    Uint8 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint64 = 6,
    PosixTimeMs = 7,
    Uuid = 8,
    NilUuid = 9,
    String = 10,
    SmallString = 11,
    RawData = 12,
    List = 13,
    BigList = 14,
    // 15 is reserved.
}

impl Tag {
    pub const fn as_nibble(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "Null",
            Tag::Bool => "Bool",
            Tag::SmallInt => "SmallInt",
            Tag::Uint8 => "Uint8",
            Tag::Uint16 => "Uint16",
            Tag::Int32 => "Int32",
            Tag::Uint64 => "Uint64",
            Tag::PosixTimeMs => "PosixTimeMs",
            Tag::Uuid => "Uuid",
            Tag::NilUuid => "NilUuid",
            Tag::String => "String",
            Tag::SmallString => "SmallString",
            Tag::RawData => "RawData",
            Tag::List => "List",
            Tag::BigList => "BigList",
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = CodecError;

    fn try_from(nibble: u8) -> Result<Self, Self::Error> {
        Ok(match nibble {
            0 => Tag::Null,
            1 => Tag::Bool,
            2 => Tag::SmallInt,
            3 => Tag::Uint8,
            4 => Tag::Uint16,
            5 => Tag::Int32,
            6 => Tag::Uint64,
            7 => Tag::PosixTimeMs,
            8 => Tag::Uuid,
            9 => Tag::NilUuid,
            10 => Tag::String,
            11 => Tag::SmallString,
            12 => Tag::RawData,
            13 => Tag::List,
            14 => Tag::BigList,
            other => return Err(CodecError::BadTag(other)),
        })
    }
}

pub const MAX_SMALL_STRING: usize = 15;
pub const MAX_LIST_PAYLOAD: usize = 0xFFF; // 12-bit size: 4095 bytes
pub const MAX_BIGLIST_PAYLOAD: usize = 0xF_FFFF; // 20-bit size: ~1 MiB
