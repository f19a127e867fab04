//! Chunk size selection and span derivation for one file.
//!
//! Sizes are tiered so small files get fine-grained retry units while
//! large files keep the chunk count (and per-chunk request overhead)
//! bounded. 10 MiB is the absolute ceiling regardless of file size.

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Largest chunk size the planner will ever select.
pub const MAX_CHUNK_SIZE: u64 = 10 * MIB;

/// Select the chunk size for a file of `file_size` bytes.
pub fn chunk_size_for(file_size: u64) -> u64 {
    if file_size <= MIB {
        256 * KIB
    } else if file_size <= 100 * MIB {
        MIB
    } else if file_size <= GIB {
        5 * MIB
    } else {
        MAX_CHUNK_SIZE
    }
}

/// Byte range of a single planned chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: u64,
    pub offset: u64,
    pub len: u64,
}

/// Chunking plan for one file: chunk size plus derived chunk count.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

impl ChunkPlan {
    /// Plan a file of `file_size` bytes using the tier table.
    ///
    /// A zero-byte file still yields exactly one (empty) chunk so it is
    /// representable on the wire and finalizable on the receiver.
    pub fn new(file_size: u64) -> Self {
        let chunk_size = chunk_size_for(file_size);
        let total_chunks = if file_size == 0 {
            1
        } else {
            file_size.div_ceil(chunk_size)
        };
        Self {
            file_size,
            chunk_size,
            total_chunks,
        }
    }

    /// Byte span of chunk `index`. The last chunk carries the remainder.
    ///
    /// # Panics
    ///
    /// Panics if `index >= total_chunks`; callers iterate `spans()` or
    /// bound the index themselves.
    pub fn span(&self, index: u64) -> ChunkSpan {
        assert!(index < self.total_chunks, "chunk index out of plan");
        let offset = index * self.chunk_size;
        let len = std::cmp::min(self.chunk_size, self.file_size - offset);
        ChunkSpan { index, offset, len }
    }

    /// Iterate all chunk spans in index order.
    pub fn spans(&self) -> impl Iterator<Item = ChunkSpan> + '_ {
        (0..self.total_chunks).map(|i| self.span(i))
    }

    pub fn is_last(&self, index: u64) -> bool {
        index + 1 == self.total_chunks
    }
}
