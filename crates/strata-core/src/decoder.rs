use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::chunk::CHUNK_SIZE;
use crate::container::StreamView;
use crate::error::StrataError;
use crate::pipeline::ChunkPipeline;
use crate::types::Result;

/// Reciprocal of [`crate::ParallelEncoder`].
///
/// Must be built with the same pipeline the encoder used; the stream
/// records neither the chunk size nor the stage configuration.
pub struct Decoder {
    pipeline: ChunkPipeline,
}

impl Decoder {
    pub fn new(pipeline: ChunkPipeline) -> Self {
        Self { pipeline }
    }

    /// Reconstructs the original buffer from an encoded stream.
    ///
    /// Any structural inconsistency or failing stage inverse is a
    /// fatal error; no partial output is returned.
    pub fn decode(&self, stream: &[u8]) -> Result<Vec<u8>> {
        let started_at = Instant::now();
        let view = StreamView::parse(stream)?;
        let original_size = view.header().original_size as usize;

        // Chunks decode independently; output regions are fixed-size
        // slices, so rayon can hand each worker a disjoint window.
        let mut out = vec![0u8; original_size];
        out.par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .try_for_each(|(id, out_chunk)| self.decode_chunk(&view, id, out_chunk))?;

        debug!(
            chunks = view.chunk_count(),
            stream_bytes = stream.len(),
            output_bytes = out.len(),
            elapsed_us = started_at.elapsed().as_micros() as u64,
            "decode complete"
        );

        Ok(out)
    }

    fn decode_chunk(&self, view: &StreamView<'_>, id: usize, out_chunk: &mut [u8]) -> Result<()> {
        let (stored, original_len) = view.chunk(id);
        debug_assert_eq!(out_chunk.len(), original_len);

        if stored.len() == original_len {
            // Raw chunk; rawness is inferred from the size match.
            out_chunk.copy_from_slice(stored);
        } else {
            let unpacked = self
                .pipeline
                .compress()
                .reverse(stored, original_len)
                .map_err(|error| error.with_context(format!("chunk {id}")))?;
            if unpacked.len() != original_len {
                return Err(StrataError::DecompressionError(format!(
                    "chunk {id} inverse produced {} bytes, expected {original_len}",
                    unpacked.len()
                )));
            }
            out_chunk.copy_from_slice(&unpacked);
        }

        if let Some(stage) = self.pipeline.preprocess() {
            let restored = stage
                .reverse(out_chunk, original_len)
                .map_err(|error| error.with_context(format!("chunk {id}")))?;
            out_chunk.copy_from_slice(&restored);
        }

        Ok(())
    }
}
