//! Streaming CRC-32 used per chunk and as a running whole-file digest.
//!
//! Standard reflected CRC-32 (polynomial 0xEDB88320, IEEE form), init
//! 0xFFFFFFFF, output XOR 0xFFFFFFFF. The running form is what lets the
//! sender digest a file chunk-by-chunk without ever buffering the whole
//! thing: feed chunk N with the state left by chunk N-1 and finish after
//! the last chunk.

use crc32fast::Hasher;

/// Incremental CRC-32 accumulator.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Feed more bytes into the running state.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finalized value of the current state without consuming it.
    pub fn peek(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Consume the accumulator and return the finalized checksum.
    pub fn finish(self) -> u32 {
        self.hasher.finalize()
    }
}

/// One-shot checksum over a complete byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}
