use thiserror::Error;

/// Failure modes for the self-describing codec.
///
/// Every variant corresponds to a `MalformedEncoding` case from the spec:
/// an out-of-range tag, a size that overflows its container, or a value
/// read back as the wrong type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated: expected at least {needed} more byte(s), found {found}")]
    Truncated { needed: usize, found: usize },

    #[error("tag nibble {0:#x} is out of range (reserved)")]
    BadTag(u8),

    #[error("chunk has type {actual:?}, expected {expected:?}")]
    TypeMismatch { expected: &'static str, actual: &'static str },

    #[error("string body is not valid utf-8")]
    InvalidUtf8,

    #[error("container payload of {len} bytes exceeds the 1 MiB BigList cap")]
    SizeOverflow { len: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
