use crate::error::StrataError;
use crate::stage::{StageOutcome, StageTransform};
use crate::types::Result;

/// Largest quantization bin representable in a 31-bit zigzag code.
const MAX_BIN: i64 = (1 << 30) - 1;

/// Error-bounded lossy quantizer for little-endian f32 words.
///
/// Each word is replaced in place by a same-width code. A value that
/// quantizes within the bound becomes a zigzag-encoded bin with the
/// low bit set as a tag. Everything else is an outlier: non-finite
/// values, bins too large for the code space, and values near a bin
/// midpoint whose reconstruction rounds fractionally past the bound.
/// Outliers keep their original bit pattern with the tag bit cleared,
/// so the inverse can tell the two apart; an outlier loses at most
/// its lowest mantissa bit.
///
/// Trailing bytes that do not form a whole word pass through
/// unmodified; the chunk size is a multiple of 8, so only the final
/// chunk of an input can carry such a tail.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    error_bound: f32,
}

impl Quantizer {
    /// Creates a quantizer for the given absolute error bound.
    ///
    /// The bound must be finite and strictly positive; a zero bound
    /// means the stage cannot discard any precision and the caller
    /// should omit it instead.
    pub fn new(error_bound: f32) -> Result<Self> {
        if !error_bound.is_finite() || error_bound <= 0.0 {
            return Err(StrataError::InvalidInput(
                "error bound must be finite and positive",
            ));
        }
        Ok(Self { error_bound })
    }

    pub fn error_bound(&self) -> f32 {
        self.error_bound
    }

    /// Bin width. Reconstruction lands on a multiple of this, so the
    /// worst-case deviation is half of it, i.e. the bound itself.
    fn step(&self) -> f64 {
        2.0 * self.error_bound as f64
    }

    fn reconstruct(&self, bin: i64) -> f32 {
        (bin as f64 * self.step()) as f32
    }

    fn encode_word(&self, bits: u32) -> u32 {
        let value = f32::from_bits(bits);
        if value.is_finite() {
            let bin = (value as f64 / self.step()).round();
            // `as i64` saturates, so an enormous bin lands outside
            // MAX_BIN and falls through to the outlier path.
            let bin = bin as i64;
            let recovered = self.reconstruct(bin);
            if bin.unsigned_abs() <= MAX_BIN as u64
                && (recovered as f64 - value as f64).abs() <= self.error_bound as f64
            {
                let zigzag = ((bin << 1) ^ (bin >> 63)) as u32;
                return (zigzag << 1) | 1;
            }
        }
        // Outlier: original bits, tag bit cleared.
        bits & !1
    }

    fn decode_word(&self, code: u32) -> u32 {
        if code & 1 == 0 {
            // Outlier, stored verbatim.
            return code;
        }
        let zigzag = (code >> 1) as i64;
        let bin = (zigzag >> 1) ^ -(zigzag & 1);
        self.reconstruct(bin).to_bits()
    }
}

impl StageTransform for Quantizer {
    fn name(&self) -> &'static str {
        "quantize"
    }

    fn apply(&self, data: &[u8]) -> Result<StageOutcome> {
        let mut out = Vec::with_capacity(data.len());
        let mut words = data.chunks_exact(4);
        for word in words.by_ref() {
            let bits = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.extend_from_slice(&self.encode_word(bits).to_le_bytes());
        }
        out.extend_from_slice(words.remainder());
        debug_assert_eq!(out.len(), data.len());
        Ok(StageOutcome::Transformed(out))
    }

    fn reverse(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        if data.len() != original_len {
            return Err(StrataError::DecompressionError(format!(
                "quantizer inverse expected {original_len} bytes, got {}",
                data.len()
            )));
        }

        let mut out = Vec::with_capacity(original_len);
        let mut words = data.chunks_exact(4);
        for word in words.by_ref() {
            let code = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.extend_from_slice(&self.decode_word(code).to_le_bytes());
        }
        out.extend_from_slice(words.remainder());
        Ok(out)
    }

    fn preserves_len(&self) -> bool {
        true
    }
}
