use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::error::{PfError, Result};
use crate::fourcc::{FourCc, fourcc_str};

/// The pack file identifier, "PF" in ASCII.
pub const PF_MAGIC: [u8; PF_MAGIC_NUMBER] = *b"PF";
const PF_MAGIC_NUMBER: usize = 2;

/// Size of the outer pack file header in bytes.
pub const PF_HEADER_SIZE: usize = 12;
/// Size of the fixed chunk header prefix in bytes.
pub const CHUNK_HEADER_SIZE: usize = 16;
/// Width of the `magic` and `next_chunk_offset` fields. `next_chunk_offset`
/// counts from the end of these fields to the end of the chunk.
const CHUNK_OFFSET_BASE: u64 = 8;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PfHeader {
    /// Always "PF".
    pub magic: [u8; PF_MAGIC_NUMBER],
    /// Format metadata, passed through untouched.
    pub descriptor_type: u16,
    /// Present on disk, value not enforced.
    pub reserved: u16,
    /// Declared header length, informational only.
    pub header_size: u16,
    /// Fourcc of the pack file's content, e.g. `MODL`.
    pub content_type: FourCc,
}

impl PfHeader {
    /// Decode the outer header from the start of `data`.
    fn read(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut header = PfHeader::default();
        cursor.read_exact(&mut header.magic)?;
        header.descriptor_type = cursor.read_u16::<LittleEndian>()?;
        header.reserved = cursor.read_u16::<LittleEndian>()?;
        header.header_size = cursor.read_u16::<LittleEndian>()?;
        header.content_type = cursor.read_u32::<LittleEndian>()?;
        Ok(header)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PfChunkHeader {
    /// Chunk identifier.
    pub magic: FourCc,
    /// Bytes from the end of this field to the end of the chunk.
    pub next_chunk_offset: u32,
    /// Chunk format version, opaque here.
    pub version: u16,
    /// Header length of this chunk instance. May exceed 16 for newer variants.
    pub header_size: u16,
    /// Opaque, not interpreted by the reader.
    pub descriptor_offset: u32,
}

impl PfChunkHeader {
    fn read(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(PfChunkHeader {
            magic: cursor.read_u32::<LittleEndian>()?,
            next_chunk_offset: cursor.read_u32::<LittleEndian>()?,
            version: cursor.read_u16::<LittleEndian>()?,
            header_size: cursor.read_u16::<LittleEndian>()?,
            descriptor_offset: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Total size of the chunk measured from its first byte.
    pub fn total_size(&self) -> u64 {
        u64::from(self.next_chunk_offset) + CHUNK_OFFSET_BASE
    }
}

/// Byte range of a chunk payload inside a pack file buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub offset: usize,
    pub len: usize,
}

impl ChunkRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A chunk seen during a walk: where it starts and what its header says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkEntry {
    /// Absolute offset of the chunk header.
    pub offset: usize,
    pub header: PfChunkHeader,
    pub payload: ChunkRange,
}

/// Check the outer header of `data` against the expected content type.
pub fn validate_header(data: &[u8], expected: FourCc) -> Result<PfHeader> {
    if data.len() < PF_HEADER_SIZE {
        debug!(len = data.len(), "rejecting pack file: too short");
        return Err(PfError::MalformedInput { len: data.len() });
    }

    let header = PfHeader::read(data)?;
    if header.magic != PF_MAGIC {
        debug!(found = ?header.magic, "rejecting pack file: bad magic");
        return Err(PfError::BadMagic {
            found: header.magic,
        });
    }
    if header.content_type != expected {
        debug!(
            expected = %fourcc_str(expected),
            found = %fourcc_str(header.content_type),
            "rejecting pack file: content type mismatch"
        );
        return Err(PfError::TypeMismatch {
            expected,
            found: header.content_type,
        });
    }

    Ok(header)
}

/// Sequential walk over the chunks following the outer header.
///
/// Yields one entry per chunk in file order. Stops quietly once fewer than
/// 16 bytes remain; a chunk whose length fields disagree with each other or
/// with the buffer yields `MalformedChunkFraming` and ends the walk.
pub struct ChunkWalker<'a> {
    data: &'a [u8],
    position: usize,
    done: bool,
}

impl<'a> ChunkWalker<'a> {
    /// `data` must be the whole pack file, header included.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: PF_HEADER_SIZE,
            done: data.len() < PF_HEADER_SIZE,
        }
    }

    fn framing_error(&mut self, reason: &'static str) -> PfError {
        self.done = true;
        warn!(offset = self.position, reason, "malformed chunk framing");
        PfError::MalformedChunkFraming {
            offset: self.position,
            reason,
        }
    }

    fn next_entry(&mut self) -> Result<Option<ChunkEntry>> {
        let remaining = self.data.len() - self.position;
        if remaining < CHUNK_HEADER_SIZE {
            self.done = true;
            return Ok(None);
        }

        let header = PfChunkHeader::read(&self.data[self.position..])?;
        let total_size = header.total_size();

        if total_size < CHUNK_HEADER_SIZE as u64 {
            return Err(self.framing_error("chunk smaller than its header"));
        }
        if total_size < u64::from(header.header_size) {
            return Err(self.framing_error("header size exceeds chunk size"));
        }
        if total_size > remaining as u64 {
            return Err(self.framing_error("chunk extends past end of data"));
        }

        // Bounded by `remaining` above, so this fits in usize.
        let total_size = total_size as usize;
        let payload = ChunkRange {
            offset: self.position + CHUNK_HEADER_SIZE,
            len: total_size - usize::from(header.header_size),
        };
        if payload.end() > self.data.len() {
            return Err(self.framing_error("payload extends past end of data"));
        }

        let entry = ChunkEntry {
            offset: self.position,
            header,
            payload,
        };
        self.position += total_size;
        Ok(Some(entry))
    }
}

impl Iterator for ChunkWalker<'_> {
    type Item = Result<ChunkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.next_entry().transpose()
    }
}

/// Find the first chunk tagged `id` and return its payload range.
pub fn locate_chunk(data: &[u8], id: FourCc) -> Result<ChunkRange> {
    for entry in ChunkWalker::new(data) {
        let entry = entry?;
        if entry.header.magic == id {
            debug!(
                chunk = %fourcc_str(id),
                offset = entry.payload.offset,
                len = entry.payload.len,
                "located chunk"
            );
            return Ok(entry.payload);
        }
    }
    Err(PfError::ChunkNotFound { id })
}

/// List every chunk in file order.
pub fn chunk_headers(data: &[u8]) -> Result<Vec<ChunkEntry>> {
    ChunkWalker::new(data).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pf_header(content_type: FourCc) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"PF");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(PF_HEADER_SIZE as u16).to_le_bytes());
        data.extend_from_slice(&content_type.to_le_bytes());
        data
    }

    pub(crate) fn push_chunk(data: &mut Vec<u8>, magic: FourCc, payload: &[u8]) {
        let total = CHUNK_HEADER_SIZE + payload.len();
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&((total as u32) - 8).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(CHUNK_HEADER_SIZE as u16).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(payload);
    }

    fn push_raw_chunk_header(data: &mut Vec<u8>, magic: FourCc, next: u32, header_size: u16) {
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&next.to_le_bytes());
        data.extend_from_slice(&7u16.to_le_bytes());
        data.extend_from_slice(&header_size.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
    }

    const MODL_RAW: FourCc = 0x4D4F_444C;
    const ABCD: FourCc = 0x4142_4344;

    #[test]
    fn header_fields_decode_little_endian() {
        let mut data = pf_header(MODL_RAW);
        data[2] = 0x34;
        data[3] = 0x12;
        let header = validate_header(&data, MODL_RAW).unwrap();
        assert_eq!(header.magic, *b"PF");
        assert_eq!(header.descriptor_type, 0x1234);
        assert_eq!(header.header_size, 12);
        assert_eq!(header.content_type, MODL_RAW);
    }

    #[test]
    fn header_checks_run_in_order() {
        assert!(matches!(
            validate_header(&[], MODL_RAW),
            Err(PfError::MalformedInput { len: 0 })
        ));
        // Short input is reported before the bad magic is noticed.
        assert!(matches!(
            validate_header(b"XX", MODL_RAW),
            Err(PfError::MalformedInput { len: 2 })
        ));

        let mut data = pf_header(0);
        data[0] = b'Q';
        assert!(matches!(
            validate_header(&data, MODL_RAW),
            Err(PfError::BadMagic { found }) if found == *b"QF"
        ));

        data[0] = b'P';
        assert!(matches!(
            validate_header(&data, MODL_RAW),
            Err(PfError::TypeMismatch { expected: MODL_RAW, found: 0 })
        ));
    }

    #[test]
    fn locate_single_chunk() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, ABCD, b"hello");

        let range = locate_chunk(&data, ABCD).unwrap();
        assert_eq!(range, ChunkRange { offset: 28, len: 5 });
        assert_eq!(&data[range.offset..range.end()], b"hello");
        // next_chunk_offset = (16 + 5) - 8
        assert_eq!(u32::from_le_bytes(data[16..20].try_into().unwrap()), 13);

        assert!(matches!(
            locate_chunk(&data, 0x5A5A_5A5A),
            Err(PfError::ChunkNotFound { id: 0x5A5A_5A5A })
        ));
    }

    #[test]
    fn first_duplicate_wins() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, ABCD, b"first");
        push_chunk(&mut data, 0x4242_4242, b"middle");
        push_chunk(&mut data, ABCD, b"second!");

        let range = locate_chunk(&data, ABCD).unwrap();
        assert_eq!(&data[range.offset..range.end()], b"first");
    }

    #[test]
    fn later_malformed_chunk_is_not_inspected() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, ABCD, b"ok");
        push_raw_chunk_header(&mut data, 0x4242_4242, 0, 16);

        assert!(locate_chunk(&data, ABCD).is_ok());
        assert!(matches!(
            locate_chunk(&data, 0x4343_4343),
            Err(PfError::MalformedChunkFraming { offset: 30, .. })
        ));
    }

    #[test]
    fn oversized_final_chunk_stops_walk() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, ABCD, b"abc");
        push_raw_chunk_header(&mut data, 0x4242_4242, 1000, 16);
        data.extend_from_slice(b"tail");

        assert!(matches!(
            locate_chunk(&data, 0x4242_4242),
            Err(PfError::MalformedChunkFraming { .. })
        ));
    }

    #[test]
    fn non_advancing_chunk_is_malformed() {
        let mut data = pf_header(MODL_RAW);
        push_raw_chunk_header(&mut data, ABCD, 0, 16);
        assert!(matches!(
            locate_chunk(&data, 0x5A5A_5A5A),
            Err(PfError::MalformedChunkFraming { offset: 12, .. })
        ));
    }

    #[test]
    fn header_size_larger_than_chunk_is_malformed() {
        let mut data = pf_header(MODL_RAW);
        push_raw_chunk_header(&mut data, ABCD, 8, 64);
        assert!(matches!(
            locate_chunk(&data, ABCD),
            Err(PfError::MalformedChunkFraming { .. })
        ));
    }

    #[test]
    fn extended_chunk_header_shortens_payload() {
        let mut data = pf_header(MODL_RAW);
        // 24-byte header instance followed by 4 payload bytes: total 28.
        push_raw_chunk_header(&mut data, ABCD, 20, 24);
        data.extend_from_slice(&[0xAA; 8]);
        data.extend_from_slice(b"data");

        let range = locate_chunk(&data, ABCD).unwrap();
        assert_eq!(range, ChunkRange { offset: 28, len: 4 });
    }

    #[test]
    fn trailing_partial_header_is_ignored() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, ABCD, b"x");
        data.extend_from_slice(&[0u8; 15]);

        let entries = chunk_headers(&data).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            locate_chunk(&data, 0x5A5A_5A5A),
            Err(PfError::ChunkNotFound { .. })
        ));
    }

    #[test]
    fn walk_lists_chunks_in_file_order() {
        let mut data = pf_header(MODL_RAW);
        push_chunk(&mut data, 0x3131_3131, b"a");
        push_chunk(&mut data, 0x3232_3232, b"bb");
        push_chunk(&mut data, 0x3333_3333, b"");

        let entries = chunk_headers(&data).unwrap();
        let magics: Vec<FourCc> = entries.iter().map(|e| e.header.magic).collect();
        assert_eq!(magics, [0x3131_3131, 0x3232_3232, 0x3333_3333]);
        assert_eq!(entries[0].offset, 12);
        assert_eq!(entries[1].offset, 29);
        assert_eq!(entries[2].payload.len, 0);
    }

    #[test]
    fn walker_yields_nothing_for_short_buffers() {
        assert_eq!(ChunkWalker::new(&[]).count(), 0);
        assert_eq!(ChunkWalker::new(&pf_header(MODL_RAW)).count(), 0);
    }
}
