use std::sync::atomic::{AtomicU64, Ordering};

/// How many spins to burn before yielding the time slice.
const SPIN_LIMIT: u32 = 1 << 10;

/// Per-chunk published payload offsets forming a forward dependency
/// chain between adjacent chunks.
///
/// Slot `i` holds the payload offset one past the end of chunk `i`'s
/// stored bytes, which is exactly where chunk `i + 1` begins. Each
/// slot has a single writer (the worker that owns the chunk) and at
/// most one reader (the successor's worker), so plain Release/Acquire
/// atomics suffice; no lock is involved.
///
/// `0` is the unpublished sentinel. It cannot collide with a real
/// offset because every chunk stores at least one byte, so every
/// published value is strictly positive.
pub struct CarryChain {
    slots: Vec<AtomicU64>,
}

impl CarryChain {
    pub fn new(chunks: usize) -> Self {
        let slots = (0..chunks).map(|_| AtomicU64::new(0)).collect();
        Self { slots }
    }

    /// Base payload offset for chunk `id`.
    ///
    /// Chunk 0 always starts at offset 0; any later chunk busy-polls
    /// its predecessor's slot until it is published. Fairness comes
    /// from the claim order: a predecessor is always claimed no later
    /// than its successor, so the spin cannot be starved.
    pub fn wait_for_base(&self, id: usize) -> u64 {
        if id == 0 {
            return 0;
        }

        let slot = &self.slots[id - 1];
        let mut spins = 0u32;
        loop {
            let offset = slot.load(Ordering::Acquire);
            if offset != 0 {
                return offset;
            }
            spins += 1;
            if spins >= SPIN_LIMIT {
                spins = 0;
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }

    /// Publishes the end offset of chunk `id` for its successor.
    pub fn publish(&self, id: usize, end_offset: u64) {
        assert!(end_offset > 0, "a chunk never stores zero bytes");
        self.slots[id].store(end_offset, Ordering::Release);
    }

    /// End offset of the final chunk, i.e. the total payload length.
    ///
    /// Only meaningful after every chunk has published.
    pub fn final_offset(&self) -> u64 {
        match self.slots.last() {
            Some(slot) => slot.load(Ordering::Acquire),
            None => 0,
        }
    }
}
