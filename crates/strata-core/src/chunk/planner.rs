use std::ops::Range;

/// Fixed chunk size in bytes, shared by encoder and decoder.
///
/// Must be a multiple of 8 for word alignment and fit the 16-bit
/// size-table entries; it is not stored in the stream, so both sides
/// must be built with the same value.
pub const CHUNK_SIZE: usize = 16 * 1024;

const _: () = assert!(CHUNK_SIZE % 8 == 0);
const _: () = assert!(CHUNK_SIZE <= u16::MAX as usize);

/// Partitions an input into fixed-size chunks; the last may be short.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    input_len: usize,
}

impl ChunkPlanner {
    pub fn new(input_len: usize) -> Self {
        Self { input_len }
    }

    /// Number of chunks: `ceil(input_len / CHUNK_SIZE)`.
    pub fn chunk_count(&self) -> usize {
        self.input_len.div_ceil(CHUNK_SIZE)
    }

    /// Byte range of chunk `id`. Ranges exactly partition the input.
    pub fn range(&self, id: usize) -> Range<usize> {
        debug_assert!(id < self.chunk_count());
        let start = id * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(self.input_len);
        start..end
    }

    /// Original size of chunk `id`; strictly positive by construction.
    pub fn chunk_len(&self, id: usize) -> usize {
        self.range(id).len()
    }
}

/// Original size of chunk `id` for an input of `original_size` bytes.
///
/// Decode-side counterpart of [`ChunkPlanner::chunk_len`], usable
/// before any buffer exists.
pub fn chunk_len_for(original_size: u64, id: usize) -> usize {
    let start = id as u64 * CHUNK_SIZE as u64;
    (original_size - start).min(CHUNK_SIZE as u64) as usize
}
