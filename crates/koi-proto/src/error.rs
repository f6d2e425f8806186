use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error(transparent)]
    Codec(#[from] koi_codec::CodecError),
    #[error(transparent)]
    Endpoint(#[from] crate::endpoint::EndpointError),
    #[error("unknown message op byte {0}")]
    BadOp(u64),
    #[error("unknown response value tag {0}")]
    BadValueTag(u64),
    #[error("wire version {got} does not match expected {expected}")]
    VersionMismatch { expected: u8, got: u8 },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
