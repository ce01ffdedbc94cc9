pub mod chunk;
pub mod container;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod types;

pub use chunk::{CarryChain, ChunkPlanner, CHUNK_SIZE};
pub use container::{StreamHeader, StreamView, HEADER_SIZE, SIZE_ENTRY_SIZE};
pub use decoder::Decoder;
pub use encoder::{EncoderOptions, ParallelEncoder};
pub use error::StrataError;
pub use pipeline::ChunkPipeline;
pub use stage::{BitPacker, Quantizer, StageOutcome, StageTransform};
pub use types::{EncodeStats, Result};
