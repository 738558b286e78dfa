use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::chunk_factory::{Amat, ChunkFactory, FileType, MissingChunk, Modl};
use crate::error::{PfError, Result};
use crate::fourcc::{FourCc, fourcc_str};
use crate::pf_parser::{self, ChunkEntry, ChunkRange, PfHeader};

/// Immutable, shared copy of a whole pack file.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteSource(Arc<[u8]>);

impl ByteSource {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &ByteSource) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource").field("len", &self.0.len()).finish()
    }
}

/// Read-only view of a chunk payload. Holds its byte source alive, so it
/// stays valid after the pack file it came from is reassigned or dropped.
#[derive(Clone)]
pub struct ChunkView {
    source: ByteSource,
    range: ChunkRange,
}

impl ChunkView {
    pub fn range(&self) -> ChunkRange {
        self.range
    }

    pub fn source(&self) -> &ByteSource {
        &self.source
    }
}

impl Deref for ChunkView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.source[self.range.offset..self.range.end()]
    }
}

impl AsRef<[u8]> for ChunkView {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for ChunkView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkView")
            .field("offset", &self.range.offset)
            .field("len", &self.range.len)
            .finish()
    }
}

#[derive(Clone)]
struct Loaded {
    data: ByteSource,
    header: PfHeader,
}

/// A pack file bound to one content type.
///
/// Cloning shares the loaded bytes. `load` and `assign` either replace the
/// bytes wholesale or leave the pack file exactly as it was.
pub struct PackFile<F: FileType> {
    loaded: Option<Loaded>,
    missing_chunk: MissingChunk,
    file_type: PhantomData<F>,
}

// Manual impls so `F` itself needs no bounds.
impl<F: FileType> Clone for PackFile<F> {
    fn clone(&self) -> Self {
        Self {
            loaded: self.loaded.clone(),
            missing_chunk: self.missing_chunk,
            file_type: PhantomData,
        }
    }
}

impl<F: FileType> Default for PackFile<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileType> fmt::Debug for PackFile<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackFile")
            .field("file_type", &fourcc_str(F::FOURCC))
            .field("header", &self.loaded.as_ref().map(|l| l.header))
            .field("len", &self.loaded.as_ref().map(|l| l.data.len()))
            .field("missing_chunk", &self.missing_chunk)
            .finish()
    }
}

impl<F: FileType> PackFile<F> {
    /// An empty pack file with nothing loaded.
    pub fn new() -> Self {
        Self {
            loaded: None,
            missing_chunk: MissingChunk::default(),
            file_type: PhantomData,
        }
    }

    /// Open and validate the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pack_file = Self::new();
        pack_file.load(path)?;
        Ok(pack_file)
    }

    /// Validate and take a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut pack_file = Self::new();
        pack_file.assign(data)?;
        Ok(pack_file)
    }

    /// Choose how `typed_chunk` handles missing chunks.
    pub fn with_missing_chunk(mut self, policy: MissingChunk) -> Self {
        self.missing_chunk = policy;
        self
    }

    pub fn missing_chunk(&self) -> MissingChunk {
        self.missing_chunk
    }

    /// Read the whole file at `path` and assign it.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), len = data.len(), "read pack file");
        self.assign_vec(data)
    }

    /// Replace the loaded data with a copy of `data` if its header is valid.
    pub fn assign(&mut self, data: &[u8]) -> Result<()> {
        let header = pf_parser::validate_header(data, F::FOURCC)?;
        self.loaded = Some(Loaded {
            data: ByteSource(Arc::from(data)),
            header,
        });
        Ok(())
    }

    /// Like [`assign`](Self::assign), taking ownership of the buffer.
    pub fn assign_vec(&mut self, data: Vec<u8>) -> Result<()> {
        let header = pf_parser::validate_header(&data, F::FOURCC)?;
        self.loaded = Some(Loaded {
            data: ByteSource(Arc::from(data)),
            header,
        });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The content type, or `None` if nothing is loaded.
    pub fn content_type(&self) -> Option<FourCc> {
        self.loaded.as_ref().map(|_| F::FOURCC)
    }

    /// The outer header of the loaded data.
    pub fn header(&self) -> Option<&PfHeader> {
        self.loaded.as_ref().map(|l| &l.header)
    }

    /// The loaded bytes.
    pub fn data(&self) -> Option<&ByteSource> {
        self.loaded.as_ref().map(|l| &l.data)
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.loaded.as_ref().ok_or(PfError::NotLoaded)
    }

    /// Find the first chunk tagged `id`, distinguishing a missing chunk from
    /// broken framing.
    pub fn try_locate_chunk(&self, id: FourCc) -> Result<ChunkRange> {
        pf_parser::locate_chunk(&self.loaded()?.data, id)
    }

    /// Find the first chunk tagged `id`. Any failure reads as absence.
    pub fn locate_chunk(&self, id: FourCc) -> Option<ChunkRange> {
        self.try_locate_chunk(id).ok()
    }

    /// Borrow the payload of the first chunk tagged `id`.
    pub fn chunk(&self, id: FourCc) -> Option<&[u8]> {
        let loaded = self.loaded.as_ref()?;
        let range = pf_parser::locate_chunk(&loaded.data, id).ok()?;
        Some(&loaded.data[range.offset..range.end()])
    }

    /// Shared view of the payload of the first chunk tagged `id`.
    pub fn chunk_view(&self, id: FourCc) -> Result<ChunkView> {
        let loaded = self.loaded()?;
        let range = pf_parser::locate_chunk(&loaded.data, id)?;
        Ok(ChunkView {
            source: loaded.data.clone(),
            range,
        })
    }

    /// All chunks in file order.
    pub fn chunks(&self) -> Result<Vec<ChunkEntry>> {
        pf_parser::chunk_headers(&self.loaded()?.data)
    }

    /// Decode chunk `ID` with the decoder registered for this file type.
    pub fn typed_chunk<const ID: u32>(&self) -> Result<Arc<<F as ChunkFactory<ID>>::Chunk>>
    where
        F: ChunkFactory<ID>,
    {
        let data = match self.chunk_view(ID) {
            Ok(view) => view,
            Err(PfError::ChunkNotFound { .. }) if self.missing_chunk == MissingChunk::DecodeEmpty => {
                debug!(chunk = %fourcc_str(ID), "chunk absent, decoding empty payload");
                return Ok(Arc::new(<F as ChunkFactory<ID>>::decode(&[])?));
            }
            Err(err) => {
                if matches!(err, PfError::MalformedChunkFraming { .. }) {
                    warn!(chunk = %fourcc_str(ID), "typed chunk lookup hit malformed framing");
                }
                return Err(err);
            }
        };
        Ok(Arc::new(<F as ChunkFactory<ID>>::decode(&data)?))
    }
}

// FourCC names, in alphabetic order
pub type AmatPackFile = PackFile<Amat>;
pub type ModlPackFile = PackFile<Modl>;

// Descriptive names, in alphabetic order
pub type MaterialPackFile = PackFile<Amat>;
pub type ModelPackFile = PackFile<Modl>;
