//! Persists one verified chunk into a session's scratch area.

use anyhow::Context;

use crate::checksum;
use crate::common::AppError;
use crate::protocol::ChunkMeta;
use crate::receive::session::UploadSession;

/// Result of one chunk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    /// Same index re-submitted with valid data; storage was overwritten
    /// but nothing was re-counted.
    Duplicate,
}

/// Verify and persist one chunk.
///
/// All validation happens before any mutation: a rejected chunk leaves
/// the session untouched and must never count as received. Re-submission
/// of an already-accepted index overwrites the scratch file (idempotent
/// storage) without touching the byte tally.
pub async fn write_chunk(
    session: &mut UploadSession,
    meta: &ChunkMeta,
    payload: &[u8],
) -> Result<WriteOutcome, AppError> {
    if meta.total_chunks != session.total_chunks() {
        return Err(AppError::BadRequest(format!(
            "totalChunks mismatch for active session: declared {}, session has {}",
            meta.total_chunks,
            session.total_chunks()
        )));
    }

    if meta.chunk_index >= session.total_chunks() {
        return Err(AppError::BadRequest(format!(
            "chunkIndex {} out of range (totalChunks {})",
            meta.chunk_index,
            session.total_chunks()
        )));
    }

    if meta.chunk_size != payload.len() as u64 {
        return Err(AppError::BadRequest(format!(
            "chunk {} size mismatch: declared {} bytes, received {}",
            meta.chunk_index,
            meta.chunk_size,
            payload.len()
        )));
    }

    let computed = checksum::crc32(payload);
    if computed != meta.chunk_checksum {
        return Err(AppError::BadRequest(format!(
            "chunk {} checksum mismatch: declared {:#010x}, computed {:#010x}",
            meta.chunk_index, meta.chunk_checksum, computed
        )));
    }

    let chunk_path = session.chunk_path(meta.chunk_index)?;
    tokio::fs::write(&chunk_path, payload)
        .await
        .with_context(|| {
            format!(
                "Failed to write chunk {} to {}",
                meta.chunk_index,
                chunk_path.display()
            )
        })?;

    // The running whole-file digest rides on the final chunk only; zero
    // means the sender did not supply one.
    if meta.is_last() && meta.file_checksum != 0 {
        session.set_expected_file_checksum(meta.file_checksum);
    }

    if session.mark_received(meta.chunk_index, payload.len() as u64) {
        tracing::debug!(
            file = session.file_name(),
            chunk_index = meta.chunk_index,
            bytes = payload.len(),
            received = session.chunk_count(),
            total = session.total_chunks(),
            "chunk accepted"
        );
        Ok(WriteOutcome::Accepted)
    } else {
        tracing::debug!(
            file = session.file_name(),
            chunk_index = meta.chunk_index,
            "duplicate chunk re-accepted"
        );
        Ok(WriteOutcome::Duplicate)
    }
}
