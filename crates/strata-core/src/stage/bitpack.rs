use crate::error::StrataError;
use crate::stage::{StageOutcome, StageTransform};
use crate::types::Result;

/// Nibbles per 32-bit word.
const PLANES: u32 = 8;

/// Lossless nibble-plane packer over little-endian 32-bit words.
///
/// A one-byte mask records which of the eight nibble planes carry any
/// set bit across the whole chunk; only those planes are emitted, two
/// nibbles per byte. Trailing bytes that do not form a whole word are
/// stored verbatim after the packed stream.
///
/// Packed layout: `[mask: u8][packed nibbles][tail bytes]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitPacker;

impl BitPacker {
    pub fn new() -> Self {
        Self
    }

    fn packed_len(words: usize, used_planes: u32, tail: usize) -> usize {
        let nibbles = words * used_planes as usize;
        1 + nibbles.div_ceil(2) + tail
    }
}

impl StageTransform for BitPacker {
    fn name(&self) -> &'static str {
        "bitpack"
    }

    fn apply(&self, data: &[u8]) -> Result<StageOutcome> {
        let words = data.len() / 4;
        let tail = data.len() % 4;
        if words == 0 {
            // Nothing to pack on a sub-word chunk.
            return Ok(StageOutcome::Unchanged);
        }

        let mut mask = 0u8;
        for word in data.chunks_exact(4) {
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            for plane in 0..PLANES {
                if value >> (plane * 4) & 0xF != 0 {
                    mask |= 1 << plane;
                }
            }
        }

        let used = mask.count_ones();
        let packed_len = Self::packed_len(words, used, tail);
        if packed_len >= data.len() {
            return Ok(StageOutcome::Unchanged);
        }

        let mut out = Vec::with_capacity(packed_len);
        out.push(mask);

        let mut pending: Option<u8> = None;
        for word in data.chunks_exact(4) {
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            for plane in 0..PLANES {
                if mask & (1 << plane) == 0 {
                    continue;
                }
                let nibble = (value >> (plane * 4) & 0xF) as u8;
                match pending.take() {
                    None => pending = Some(nibble),
                    Some(low) => out.push(low | (nibble << 4)),
                }
            }
        }
        if let Some(low) = pending {
            out.push(low);
        }

        out.extend_from_slice(&data[words * 4..]);
        debug_assert_eq!(out.len(), packed_len);
        Ok(StageOutcome::Transformed(out))
    }

    fn reverse(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        let words = original_len / 4;
        let tail = original_len % 4;
        if data.is_empty() || words == 0 {
            return Err(StrataError::DecompressionError(
                "packed chunk is too short for its recorded size".to_string(),
            ));
        }

        let mask = data[0];
        let used = mask.count_ones();
        let expected = Self::packed_len(words, used, tail);
        if data.len() != expected {
            return Err(StrataError::DecompressionError(format!(
                "packed chunk length {} does not match expected {expected}",
                data.len()
            )));
        }

        let nibble_bytes = &data[1..data.len() - tail];
        let mut out = Vec::with_capacity(original_len);
        let mut cursor = 0usize;
        let mut read_nibble = |cursor: &mut usize| -> u8 {
            let byte = nibble_bytes[*cursor / 2];
            let nibble = if *cursor % 2 == 0 { byte & 0xF } else { byte >> 4 };
            *cursor += 1;
            nibble
        };

        for _ in 0..words {
            let mut value = 0u32;
            for plane in 0..PLANES {
                if mask & (1 << plane) == 0 {
                    continue;
                }
                value |= (read_nibble(&mut cursor) as u32) << (plane * 4);
            }
            out.extend_from_slice(&value.to_le_bytes());
        }

        out.extend_from_slice(&data[data.len() - tail..]);
        debug_assert_eq!(out.len(), original_len);
        Ok(out)
    }
}
