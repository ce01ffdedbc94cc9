use crate::chunk::{chunk_len_for, CHUNK_SIZE};
use crate::error::StrataError;
use crate::types::Result;

/// Stream layout, all integers little-endian:
///
/// ```text
/// [0..8)                originalSize      u64
/// [8..8 + 2*chunks)     sizeTable[chunks] u16 each, chunk order
/// [8 + 2*chunks..end)   payload           stored chunk bytes, chunk order
/// ```
///
/// `chunks = ceil(originalSize / CHUNK_SIZE)`; the chunk size itself
/// is a compile-time constant and is not stored.
pub const HEADER_SIZE: usize = 8;
pub const SIZE_ENTRY_SIZE: usize = 2;

/// Byte offset of the payload region for a stream with `chunks` chunks.
pub fn payload_offset(chunks: usize) -> usize {
    HEADER_SIZE + SIZE_ENTRY_SIZE * chunks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub original_size: u64,
}

impl StreamHeader {
    pub fn new(original_size: u64) -> Self {
        Self { original_size }
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        self.original_size.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            original_size: u64::from_le_bytes(bytes),
        }
    }

    /// Number of chunks implied by the recorded original size.
    pub fn chunk_count(&self) -> usize {
        self.original_size.div_ceil(CHUNK_SIZE as u64) as usize
    }
}

/// Parsed, fully validated view over an encoded stream.
///
/// Parsing checks every structural invariant up front so chunk decode
/// can index without further bounds concern: nonzero original size,
/// a complete size table, `0 < storedSize <= originalChunkSize` per
/// entry, and an exact total length with no trailing bytes.
#[derive(Debug)]
pub struct StreamView<'a> {
    header: StreamHeader,
    sizes: Vec<u16>,
    offsets: Vec<usize>,
    payload: &'a [u8],
}

impl<'a> StreamView<'a> {
    pub fn parse(stream: &'a [u8]) -> Result<Self> {
        if stream.len() < HEADER_SIZE {
            return Err(StrataError::InvalidFormat("stream shorter than header"));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&stream[..HEADER_SIZE]);
        let header = StreamHeader::from_bytes(header_bytes);
        if header.original_size == 0 {
            return Err(StrataError::InvalidFormat("stream records a zero original size"));
        }
        if usize::try_from(header.original_size).is_err() {
            return Err(StrataError::InvalidFormat(
                "original size exceeds addressable memory",
            ));
        }

        let chunks = header.chunk_count();
        let payload_base = payload_offset(chunks);
        if stream.len() < payload_base {
            return Err(StrataError::InvalidFormat("stream truncated inside size table"));
        }

        let mut sizes = Vec::with_capacity(chunks);
        let mut offsets = Vec::with_capacity(chunks);
        let mut next_offset = 0usize;
        for id in 0..chunks {
            let at = HEADER_SIZE + SIZE_ENTRY_SIZE * id;
            let stored = u16::from_le_bytes([stream[at], stream[at + 1]]);
            if stored == 0 {
                return Err(StrataError::InvalidFormat("size table records an empty chunk"));
            }
            if stored as usize > chunk_len_for(header.original_size, id) {
                return Err(StrataError::InvalidFormat(
                    "size table entry exceeds the chunk's original size",
                ));
            }
            sizes.push(stored);
            offsets.push(next_offset);
            next_offset += stored as usize;
        }

        let payload = &stream[payload_base..];
        if payload.len() != next_offset {
            return Err(StrataError::InvalidFormat(
                "stream length does not match the size table",
            ));
        }

        Ok(Self {
            header,
            sizes,
            offsets,
            payload,
        })
    }

    pub fn header(&self) -> StreamHeader {
        self.header
    }

    pub fn chunk_count(&self) -> usize {
        self.sizes.len()
    }

    /// Stored bytes and original length of chunk `id`.
    ///
    /// The chunk was stored raw exactly when the two lengths match.
    pub fn chunk(&self, id: usize) -> (&'a [u8], usize) {
        let offset = self.offsets[id];
        let stored = self.sizes[id] as usize;
        let original_len = chunk_len_for(self.header.original_size, id);
        (&self.payload[offset..offset + stored], original_len)
    }
}
