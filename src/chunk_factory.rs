//! Compile-time binding of (content type, chunk id) pairs to decoders.
//!
//! A pack file format is a marker type implementing [`FileType`]. Each chunk
//! the format knows how to decode is registered by implementing
//! [`ChunkFactory`] for that marker with the chunk's fourcc as the const
//! parameter:
//!
//! ```
//! use gw2pf::{ChunkFactory, FileType, FourCc, Result, fourcc};
//!
//! pub struct Modl;
//! impl FileType for Modl {
//!     const FOURCC: FourCc = fourcc(b"MODL");
//! }
//!
//! pub struct Properties(pub Vec<u8>);
//! impl ChunkFactory<{ fourcc(b"PROP") }> for Modl {
//!     type Chunk = Properties;
//!     fn decode(data: &[u8]) -> Result<Properties> {
//!         Ok(Properties(data.to_vec()))
//!     }
//! }
//! ```
//!
//! Two formats may reuse the same chunk id with different layouts, which is
//! why the binding is keyed on the file type as well.

use crate::error::Result;
use crate::fourcc::{self, FourCc};

/// A pack file format, identified by the fourcc stored in its header.
pub trait FileType {
    const FOURCC: FourCc;
}

/// Decoder for chunk `ID` of file type `Self`.
pub trait ChunkFactory<const ID: u32>: FileType {
    type Chunk;

    /// Build the chunk value from its payload bytes.
    fn decode(data: &[u8]) -> Result<Self::Chunk>;
}

/// What a typed lookup does when the chunk is not present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MissingChunk {
    /// Report `ChunkNotFound`.
    #[default]
    Absent,
    /// Run the decoder on an empty payload, for decoders that treat empty
    /// input as an empty chunk.
    DecodeEmpty,
}

/// Material pack files.
#[derive(Debug, Clone, Copy)]
pub struct Amat;

impl FileType for Amat {
    const FOURCC: FourCc = fourcc::AMAT;
}

/// Model pack files.
#[derive(Debug, Clone, Copy)]
pub struct Modl;

impl FileType for Modl {
    const FOURCC: FourCc = fourcc::MODL;
}
