//! Reassembles a completed session into its destination file.

use std::io::ErrorKind;

use anyhow::{bail, Context, Result};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::checksum::Crc32;
use crate::receive::session::UploadSession;

/// Concatenate the session's scratch chunks, in strict ascending index
/// order, into the destination path.
///
/// Chunks may have arrived in any order; index order here is the
/// correctness-critical invariant. A missing index is fatal: the
/// destination must not be treated as valid and the session (scratch area
/// included) is left in place for diagnosis rather than deleted.
///
/// On success the scratch area is removed and the whole-file CRC-32
/// accumulated during the copy is returned, verified against the sender's
/// declared value when one was supplied.
pub async fn finalize(session: &mut UploadSession) -> Result<u32> {
    if !session.is_complete() {
        bail!(
            "finalize on incomplete session: {}/{} chunks",
            session.chunk_count(),
            session.total_chunks()
        );
    }

    if let Some(parent) = session.target_path().parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create destination directory {}", parent.display())
        })?;
    }

    let mut dest = File::create(session.target_path())
        .await
        .with_context(|| {
            format!(
                "Failed to create destination file {}",
                session.target_path().display()
            )
        })?;

    let mut running = Crc32::new();
    let mut written: u64 = 0;

    for index in 0..session.total_chunks() {
        let chunk_path = session.chunk_path(index)?;
        let data = match tokio::fs::read(&chunk_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                bail!(
                    "reassembly failed for {}: chunk {} missing from scratch area",
                    session.file_name(),
                    index
                );
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read scratch chunk {}", chunk_path.display())
                });
            }
        };

        running.update(&data);
        written += data.len() as u64;
        dest.write_all(&data)
            .await
            .with_context(|| format!("Failed to append chunk {index} to destination"))?;
    }

    dest.flush().await.context("Failed to flush destination")?;

    if written != session.total_size() {
        bail!(
            "reassembly size mismatch for {}: wrote {} bytes, declared {}",
            session.file_name(),
            written,
            session.total_size()
        );
    }

    let computed = running.finish();
    if let Some(expected) = session.expected_file_checksum() {
        if computed != expected {
            bail!(
                "whole-file checksum mismatch for {}: declared {:#010x}, computed {:#010x}",
                session.file_name(),
                expected,
                computed
            );
        }
    }

    session.discard_scratch();
    tracing::info!(
        file = session.file_name(),
        bytes = written,
        checksum = format!("{computed:#010x}"),
        path = %session.target_path().display(),
        "chunked upload finalized"
    );

    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc32;
    use crate::protocol::ChunkMeta;
    use crate::receive::writer::{self, WriteOutcome};
    use tempfile::TempDir;

    fn meta(index: u64, total_chunks: u64, total_size: u64, payload: &[u8]) -> ChunkMeta {
        ChunkMeta {
            file_name: "file.bin".into(),
            chunk_index: index,
            total_chunks,
            chunk_size: payload.len() as u64,
            total_size,
            chunk_checksum: crc32(payload),
            file_checksum: 0,
        }
    }

    async fn write(
        session: &mut UploadSession,
        index: u64,
        total_chunks: u64,
        total_size: u64,
        payload: &[u8],
    ) -> WriteOutcome {
        writer::write_chunk(session, &meta(index, total_chunks, total_size, payload), payload)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn out_of_order_arrival_reassembles_in_index_order() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("file.bin");
        let mut session =
            UploadSession::new("file.bin".into(), dest.clone(), 3, 9).unwrap();

        // Arrival order 2, 0, 1.
        write(&mut session, 2, 3, 9, b"ccc").await;
        write(&mut session, 0, 3, 9, b"aaa").await;
        write(&mut session, 1, 3, 9, b"bbb").await;
        assert!(session.is_complete());

        let computed = finalize(&mut session).await.unwrap();
        assert_eq!(computed, crc32(b"aaabbbccc"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"aaabbbccc");
        // Scratch is gone after success.
        assert!(session.chunk_path(0).is_err());
    }

    #[tokio::test]
    async fn zero_byte_file_finalizes_from_one_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("empty.bin");
        let mut session =
            UploadSession::new("empty.bin".into(), dest.clone(), 1, 0).unwrap();

        write(&mut session, 0, 1, 0, b"").await;
        assert!(session.is_complete());

        finalize(&mut session).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn incomplete_session_is_never_finalized() {
        let dir = TempDir::new().unwrap();
        let mut session = UploadSession::new(
            "file.bin".into(),
            dir.path().join("file.bin"),
            3,
            9,
        )
        .unwrap();
        write(&mut session, 0, 3, 9, b"aaa").await;

        assert!(finalize(&mut session).await.is_err());
        // Scratch survives for retry.
        assert!(session.chunk_path(0).unwrap().exists());
    }

    #[tokio::test]
    async fn missing_scratch_chunk_is_fatal_and_leaves_state() {
        let dir = TempDir::new().unwrap();
        let mut session = UploadSession::new(
            "file.bin".into(),
            dir.path().join("file.bin"),
            2,
            6,
        )
        .unwrap();
        write(&mut session, 0, 2, 6, b"aaa").await;
        write(&mut session, 1, 2, 6, b"bbb").await;

        // Simulate scratch corruption behind the session's back.
        std::fs::remove_file(session.chunk_path(1).unwrap()).unwrap();

        let err = finalize(&mut session).await.unwrap_err();
        assert!(err.to_string().contains("chunk 1 missing"));
        // Remaining scratch state is kept for inspection.
        assert!(session.chunk_path(0).unwrap().exists());
    }

    #[tokio::test]
    async fn declared_file_checksum_is_verified() {
        let dir = TempDir::new().unwrap();
        let mut session = UploadSession::new(
            "file.bin".into(),
            dir.path().join("file.bin"),
            1,
            3,
        )
        .unwrap();

        let payload = b"abc";
        let mut last = meta(0, 1, 3, payload);
        last.file_checksum = crc32(payload) ^ 0xFFFF; // wrong on purpose
        writer::write_chunk(&mut session, &last, payload).await.unwrap();

        let err = finalize(&mut session).await.unwrap_err();
        assert!(err.to_string().contains("whole-file checksum mismatch"));
    }
}
