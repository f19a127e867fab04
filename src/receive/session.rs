//! Per-transfer receive session state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard};

/// Logical transfer identity: (declared file name, declared total size).
///
/// This pair is the sole session lookup key. Two concurrent uploads that
/// share both name and size are indistinguishable and will collide on one
/// session; mismatched metadata on the colliding stream is rejected rather
/// than written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub file_name: String,
    pub total_size: u64,
}

impl SessionKey {
    pub fn new(file_name: &str, total_size: u64) -> Self {
        Self {
            file_name: file_name.to_string(),
            total_size,
        }
    }
}

/// Accumulator for one in-flight chunked upload.
///
/// Chunks land as individual files in an exclusively-owned scratch
/// directory, one file per index. The scratch directory is deleted on
/// successful finalize or reaper eviction; a failed finalize leaves it in
/// place for diagnosis.
pub struct UploadSession {
    file_name: String,
    target_path: PathBuf,
    total_chunks: u64,
    total_size: u64,
    received_bytes: u64,
    received: HashSet<u64>,
    scratch: Option<TempDir>,
    expected_file_checksum: Option<u32>,
}

impl UploadSession {
    pub fn new(
        file_name: String,
        target_path: PathBuf,
        total_chunks: u64,
        total_size: u64,
    ) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("chunkdrop_")
            .tempdir()
            .context("Failed to create scratch directory for upload session")?;

        Ok(Self {
            file_name,
            target_path,
            total_chunks,
            total_size,
            received_bytes: 0,
            received: HashSet::new(),
            scratch: Some(scratch),
            expected_file_checksum: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn chunk_count(&self) -> u64 {
        self.received.len() as u64
    }

    pub fn has_chunk(&self, index: u64) -> bool {
        self.received.contains(&index)
    }

    /// Scratch file path for one chunk index.
    ///
    /// Errors once the scratch area has been discarded (eviction raced an
    /// in-flight write); the chunk must be treated as not persisted.
    pub fn chunk_path(&self, index: u64) -> Result<PathBuf> {
        let scratch = self
            .scratch
            .as_ref()
            .context("upload session scratch area already discarded")?;
        Ok(scratch.path().join(format!("chunk_{index}")))
    }

    /// Record an accepted chunk. Returns `false` for a duplicate index,
    /// which must not count toward `received_bytes` again.
    pub fn mark_received(&mut self, index: u64, len: u64) -> bool {
        if !self.received.insert(index) {
            return false;
        }
        self.received_bytes += len;
        true
    }

    pub fn set_expected_file_checksum(&mut self, checksum: u32) {
        self.expected_file_checksum = Some(checksum);
    }

    pub fn expected_file_checksum(&self) -> Option<u32> {
        self.expected_file_checksum
    }

    /// Completion means every index 0..total_chunks has been accepted.
    /// A byte tally alone would double-count duplicate submissions.
    pub fn is_complete(&self) -> bool {
        self.received.len() as u64 >= self.total_chunks
    }

    /// Delete the scratch area. Used by successful finalize and by reaper
    /// eviction; idempotent.
    pub fn discard_scratch(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove upload scratch directory"
                );
            }
        }
    }
}

/// Shared handle for one session: the state behind an async lock, plus an
/// activity timestamp the reaper can read without taking that lock.
pub struct SessionHandle {
    state: Mutex<UploadSession>,
    last_activity: StdMutex<Instant>,
}

impl SessionHandle {
    pub fn new(session: UploadSession) -> Self {
        Self {
            state: Mutex::new(session),
            last_activity: StdMutex::new(Instant::now()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, UploadSession> {
        self.state.lock().await
    }

    /// Refresh the activity timestamp; called on every accepted write.
    pub fn touch(&self) {
        let mut last = match self.last_activity.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *last = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        let last = match self.last_activity.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        last.elapsed()
    }
}
