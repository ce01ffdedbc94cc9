mod carry;
mod planner;

pub use carry::CarryChain;
pub use planner::{chunk_len_for, ChunkPlanner, CHUNK_SIZE};
