//! Reader for Guild Wars 2 pack files ("PF" containers).
//!
//! A pack file is a 12-byte header naming the content type, followed by a
//! run of chunks, each with a 16-byte header and a payload. [`PackFile`]
//! validates the header, walks chunks on demand, and hands payloads to the
//! decoders registered through [`ChunkFactory`].

pub mod chunk_factory;
pub mod error;
pub mod fourcc;
pub mod pack_file;
pub mod pf_parser;

pub use chunk_factory::{Amat, ChunkFactory, FileType, MissingChunk, Modl};
pub use error::{PfError, Result};
pub use fourcc::{FourCc, fourcc, fourcc_str};
pub use pack_file::{
    AmatPackFile, ByteSource, ChunkView, MaterialPackFile, ModelPackFile, ModlPackFile, PackFile,
};
pub use pf_parser::{ChunkEntry, ChunkRange, PfChunkHeader, PfHeader};
