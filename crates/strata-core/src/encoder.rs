use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, trace};

use crate::chunk::{CarryChain, ChunkPlanner};
use crate::container::{payload_offset, StreamHeader, HEADER_SIZE, SIZE_ENTRY_SIZE};
use crate::error::StrataError;
use crate::pipeline::ChunkPipeline;
use crate::stage::StageOutcome;
use crate::types::{EncodeStats, Result};

/// Tuning knobs for [`ParallelEncoder`].
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Number of worker threads; clamped to at least one.
    pub workers: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self { workers }
    }
}

/// Chunked parallel encoder.
///
/// Splits the input into fixed-size chunks and compresses them on a
/// pool of workers with dynamic assignment: each worker claims the
/// next unclaimed chunk from a shared counter, so workers finishing
/// cheap chunks immediately pick up more work. The claim order is
/// monotone by construction, which is what lets the carry chain spin
/// safely: a spinning worker's predecessor is always already claimed.
pub struct ParallelEncoder {
    pipeline: ChunkPipeline,
    workers: usize,
}

impl ParallelEncoder {
    pub fn new(pipeline: ChunkPipeline) -> Self {
        Self::with_options(pipeline, EncoderOptions::default())
    }

    pub fn with_options(pipeline: ChunkPipeline, options: EncoderOptions) -> Self {
        Self {
            pipeline,
            workers: options.workers.max(1),
        }
    }

    /// Encodes `input` into a self-describing stream.
    ///
    /// The stream never expands beyond header plus size table: every
    /// chunk that packing fails to strictly shrink is stored raw.
    pub fn encode(&self, input: &[u8]) -> Result<(Vec<u8>, EncodeStats)> {
        if input.is_empty() {
            return Err(StrataError::InvalidInput("input is empty"));
        }

        let started_at = Instant::now();
        let planner = ChunkPlanner::new(input.len());
        let chunks = planner.chunk_count();
        let payload_base = payload_offset(chunks);
        let workers = self.workers.min(chunks);

        // Worst case every chunk is stored raw, so header + table +
        // input length bounds the stream.
        let mut out = vec![0u8; payload_base + input.len()];
        out[..HEADER_SIZE].copy_from_slice(&StreamHeader::new(input.len() as u64).to_bytes());
        let output = OutputRegion::new(&mut out);

        let carry = CarryChain::new(chunks);
        let next_chunk = AtomicUsize::new(0);
        let chunks_packed = AtomicUsize::new(0);
        let task_counts: Vec<AtomicUsize> = (0..workers).map(|_| AtomicUsize::new(0)).collect();
        let (failure_tx, failure_rx) = unbounded::<StrataError>();

        thread::scope(|scope| {
            for worker_id in 0..workers {
                let output = &output;
                let carry = &carry;
                let next_chunk = &next_chunk;
                let chunks_packed = &chunks_packed;
                let task_counts = &task_counts;
                let failure_tx = failure_tx.clone();
                scope.spawn(move || {
                    loop {
                        let id = next_chunk.fetch_add(1, Ordering::Relaxed);
                        if id >= chunks {
                            break;
                        }

                        let original = &input[planner.range(id)];
                        let osize = original.len();
                        let mut work = original.to_vec();

                        if let Some(stage) = self.pipeline.preprocess() {
                            match stage.apply(&work) {
                                Ok(StageOutcome::Transformed(buf)) => {
                                    // A length change here would corrupt the
                                    // size table, so this stays a hard assert.
                                    assert_eq!(
                                        buf.len(),
                                        osize,
                                        "preprocessing must preserve chunk length"
                                    );
                                    work = buf;
                                }
                                Ok(StageOutcome::Unchanged) => {}
                                Err(error) => {
                                    // Keep the chunk as-is so the carry
                                    // chain still advances; the error is
                                    // surfaced once all workers join and
                                    // the stream is discarded.
                                    report_failure(&failure_tx, error);
                                }
                            }
                        }

                        // Fallback-raw: keep the packed bytes only when
                        // strictly smaller. Stage failure and
                        // no-improvement are the same case here.
                        let packed = match self.pipeline.compress().apply(&work) {
                            Ok(StageOutcome::Transformed(buf)) if buf.len() < osize => Some(buf),
                            Ok(_) => None,
                            Err(error) => {
                                trace!(chunk = id, %error, "compression stage failed, storing raw");
                                None
                            }
                        };
                        let stored: &[u8] = packed.as_deref().unwrap_or(&work);
                        if packed.is_some() {
                            chunks_packed.fetch_add(1, Ordering::Relaxed);
                        }

                        let base = carry.wait_for_base(id);
                        carry.publish(id, base + stored.len() as u64);

                        output.write_u16(HEADER_SIZE + SIZE_ENTRY_SIZE * id, stored.len() as u16);
                        output.write(payload_base + base as usize, stored);

                        task_counts[worker_id].fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        drop(failure_tx);
        if let Ok(error) = failure_rx.try_recv() {
            return Err(error);
        }

        let payload_len = carry.final_offset() as usize;
        debug_assert!(payload_len <= input.len());
        out.truncate(payload_base + payload_len);

        let chunks_packed = chunks_packed.load(Ordering::Relaxed);
        let stats = EncodeStats {
            chunks_total: chunks,
            chunks_raw: chunks - chunks_packed,
            chunks_packed,
            input_bytes: input.len() as u64,
            output_bytes: out.len() as u64,
            elapsed: started_at.elapsed(),
            worker_tasks: task_counts
                .iter()
                .map(|count| count.load(Ordering::Relaxed))
                .collect(),
        };

        debug!(
            chunks = stats.chunks_total,
            packed = stats.chunks_packed,
            raw = stats.chunks_raw,
            input_bytes = stats.input_bytes,
            output_bytes = stats.output_bytes,
            ratio = stats.ratio(),
            "encode complete"
        );

        Ok((out, stats))
    }
}

fn report_failure(failure_tx: &Sender<StrataError>, error: StrataError) {
    // The receiver outlives the worker scope, so a send failure would
    // mean the encode call itself is gone.
    let _ = failure_tx.send(error);
}

/// Shared view of the output buffer for chunk-disjoint writes.
///
/// Each size-table entry has exactly one writer (the chunk's owning
/// worker) and payload ranges are disjoint by the carry chain
/// invariant, so concurrent writes never alias.
struct OutputRegion {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: all writes go through `write`, which bounds-checks, and
// callers only write chunk-disjoint ranges (see struct docs).
unsafe impl Send for OutputRegion {}
unsafe impl Sync for OutputRegion {}

impl OutputRegion {
    fn new(buffer: &mut [u8]) -> Self {
        Self {
            ptr: buffer.as_mut_ptr(),
            len: buffer.len(),
        }
    }

    fn write(&self, offset: usize, bytes: &[u8]) {
        let end = offset
            .checked_add(bytes.len())
            .expect("output offset overflow");
        assert!(end <= self.len, "output write out of bounds");
        unsafe {
            // SAFETY: the range was bounds-checked above and concurrent
            // writers touch disjoint ranges only.
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(offset), bytes.len());
        }
    }

    fn write_u16(&self, offset: usize, value: u16) {
        self.write(offset, &value.to_le_bytes());
    }
}
