use thiserror::Error;

use crate::fourcc::{FourCc, fourcc_str};

#[derive(Debug, Error)]
pub enum PfError {
    #[error("malformed input: {len} bytes is shorter than the 12-byte pack file header")]
    MalformedInput { len: usize },

    #[error("bad magic: expected \"PF\", found {found:?}")]
    BadMagic { found: [u8; 2] },

    #[error("content type mismatch: expected {}, found {}", fourcc_str(*expected), fourcc_str(*found))]
    TypeMismatch { expected: FourCc, found: FourCc },

    #[error("malformed chunk framing at offset {offset:#x}: {reason}")]
    MalformedChunkFraming { offset: usize, reason: &'static str },

    #[error("no pack file data loaded")]
    NotLoaded,

    #[error("chunk {} not found", fourcc_str(*id))]
    ChunkNotFound { id: FourCc },

    #[error("failed to decode chunk {}: {message}", fourcc_str(*id))]
    Decode { id: FourCc, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PfError>;
