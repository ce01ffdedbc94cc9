use std::sync::Arc;

use crate::stage::{BitPacker, Quantizer, StageTransform};
use crate::types::Result;

/// The two-stage transform pipeline shared by encoder and decoder.
///
/// An optional length-preserving preprocessing stage runs before the
/// compression stage on every chunk. Both sides of a round trip must
/// be built with the same pipeline; nothing about it is recorded in
/// the stream.
#[derive(Clone)]
pub struct ChunkPipeline {
    preprocess: Option<Arc<dyn StageTransform>>,
    compress: Arc<dyn StageTransform>,
}

impl ChunkPipeline {
    pub fn new(
        preprocess: Option<Arc<dyn StageTransform>>,
        compress: Arc<dyn StageTransform>,
    ) -> Self {
        if let Some(stage) = &preprocess {
            assert!(
                stage.preserves_len(),
                "preprocessing stage must preserve chunk length"
            );
        }
        Self {
            preprocess,
            compress,
        }
    }

    /// Lossless instantiation: bit-packing only.
    pub fn bit_packing() -> Self {
        Self::new(None, Arc::new(BitPacker::new()))
    }

    /// Lossy instantiation: error-bounded quantization, then bit-packing.
    pub fn quantizing(error_bound: f32) -> Result<Self> {
        let quantizer = Quantizer::new(error_bound)?;
        Ok(Self::new(
            Some(Arc::new(quantizer)),
            Arc::new(BitPacker::new()),
        ))
    }

    pub fn preprocess(&self) -> Option<&dyn StageTransform> {
        self.preprocess.as_deref()
    }

    pub fn compress(&self) -> &dyn StageTransform {
        self.compress.as_ref()
    }
}
