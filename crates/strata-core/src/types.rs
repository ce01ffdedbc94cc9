use std::time::Duration;

use serde::Serialize;

use crate::error::StrataError;

pub type Result<T> = std::result::Result<T, StrataError>;

/// Summary of one encode call.
///
/// Collected by the encoder while its workers run; cheap enough to
/// produce unconditionally.
#[derive(Debug, Clone, Serialize)]
pub struct EncodeStats {
    /// Total number of chunks the input was split into.
    pub chunks_total: usize,
    /// Chunks stored raw because packing did not strictly shrink them.
    pub chunks_raw: usize,
    /// Chunks stored in packed form.
    pub chunks_packed: usize,
    /// Original input length in bytes.
    pub input_bytes: u64,
    /// Final stream length in bytes, header and size table included.
    pub output_bytes: u64,
    /// Wall-clock time spent inside the encode call.
    pub elapsed: Duration,
    /// Number of chunk tasks each worker completed, indexed by worker id.
    pub worker_tasks: Vec<usize>,
}

impl EncodeStats {
    /// Output bytes per input byte; 1.0 for an empty ratio base.
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            1.0
        } else {
            self.output_bytes as f64 / self.input_bytes as f64
        }
    }
}
