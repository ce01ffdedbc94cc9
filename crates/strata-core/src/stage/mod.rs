use crate::types::Result;

pub mod bitpack;
pub mod quantize;

pub use bitpack::BitPacker;
pub use quantize::Quantizer;

/// Outcome of applying a stage to one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage produced a transformed buffer.
    Transformed(Vec<u8>),
    /// The stage decided it cannot improve on the input.
    ///
    /// For a compression stage the encoder treats this exactly like a
    /// transformed buffer that failed to shrink.
    Unchanged,
}

/// A pluggable preprocessing or compression stage.
///
/// Implementations must be safe to invoke concurrently on disjoint
/// chunks: no shared mutable state between `apply` calls.
pub trait StageTransform: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &'static str;

    /// Transforms one chunk.
    fn apply(&self, data: &[u8]) -> Result<StageOutcome>;

    /// Inverts a transformed chunk back to exactly `original_len` bytes.
    fn reverse(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>>;

    /// True for stages whose output length always equals the input length.
    ///
    /// A length-preserving stage may change bit content only; the
    /// quantizer is the one such stage in this pipeline.
    fn preserves_len(&self) -> bool {
        false
    }
}
