//! Bounded-concurrency chunk upload with per-chunk retry.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::checksum::{self, Crc32};
use crate::common::TransferSettings;
use crate::planner::{ChunkPlan, ChunkSpan};
use crate::protocol::ChunkMeta;
use crate::send::progress::SendProgress;

/// Summary of one successfully transferred file.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub file_name: String,
    pub bytes: u64,
    pub chunks: u64,
    pub file_checksum: u32,
}

/// One chunk that exhausted its retry budget.
#[derive(Debug)]
struct ChunkFailure {
    index: u64,
    attempts: u32,
    error: String,
}

/// Drives chunked uploads of whole files to one receiving server.
#[derive(Clone)]
pub struct Uploader {
    client: reqwest::Client,
    endpoint: String,
    remote_dir: Option<String>,
    settings: TransferSettings,
}

impl Uploader {
    pub fn new(
        server_url: &str,
        remote_dir: Option<String>,
        settings: TransferSettings,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: chunk_endpoint(server_url),
            remote_dir,
            settings,
        })
    }

    /// Upload one file: plan chunks, digest the whole file, then push
    /// every chunk with at most `concurrency` in flight.
    ///
    /// Returns only when every chunk has been acknowledged; any chunk that
    /// exhausts its retries fails the whole file, with the failing indices
    /// reported. In-flight sibling chunks are never aborted early.
    pub async fn upload_file(
        &self,
        path: &Path,
        progress: Arc<SendProgress>,
    ) -> Result<UploadReport> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Path has no usable file name: {}", path.display()))?;

        let file_size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len();

        let plan = ChunkPlan::new(file_size);
        let file_checksum = digest_file(path).await?;

        tracing::info!(
            file = %file_name,
            bytes = file_size,
            chunks = plan.total_chunks,
            chunk_size = plan.chunk_size,
            "starting chunked upload"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut tasks: JoinSet<std::result::Result<u64, ChunkFailure>> = JoinSet::new();

        for span in plan.spans() {
            let uploader = self.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            let path = path.to_path_buf();
            let file_name = file_name.clone();
            let is_last = plan.is_last(span.index);

            tasks.spawn(async move {
                // Bounds both memory (one chunk buffered per permit) and
                // connection pressure.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("upload semaphore closed");

                let payload = read_span(&path, span).await.map_err(|e| ChunkFailure {
                    index: span.index,
                    attempts: 0,
                    error: format!("{e:#}"),
                })?;

                let meta = ChunkMeta {
                    file_name,
                    chunk_index: span.index,
                    total_chunks: plan.total_chunks,
                    chunk_size: span.len,
                    total_size: file_size,
                    chunk_checksum: checksum::crc32(&payload),
                    file_checksum: if is_last { file_checksum } else { 0 },
                };

                uploader.push_chunk(&meta, payload).await?;
                progress.add_acked(span.len);
                Ok(span.len)
            });
        }

        let mut failures: Vec<ChunkFailure> = Vec::new();
        let mut acked_bytes = 0u64;
        while let Some(joined) = tasks.join_next().await {
            match joined.context("chunk upload task panicked")? {
                Ok(bytes) => acked_bytes += bytes,
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            let detail: Vec<String> = failures
                .iter()
                .map(|f| format!("chunk {} ({} attempts): {}", f.index, f.attempts, f.error))
                .collect();
            bail!(
                "upload of {} failed after retries: {}",
                file_name,
                detail.join("; ")
            );
        }

        tracing::info!(file = %file_name, bytes = acked_bytes, "upload complete");
        Ok(UploadReport {
            file_name,
            bytes: acked_bytes,
            chunks: plan.total_chunks,
            file_checksum,
        })
    }

    /// Send one chunk, retrying up to the configured ceiling with a fixed
    /// inter-attempt delay.
    async fn push_chunk(
        &self,
        meta: &ChunkMeta,
        payload: Bytes,
    ) -> std::result::Result<(), ChunkFailure> {
        let meta_json = serde_json::to_string(meta).map_err(|e| ChunkFailure {
            index: meta.chunk_index,
            attempts: 0,
            error: format!("metadata encode failed: {e}"),
        })?;

        let mut last_error = String::new();
        for attempt in 1..=self.settings.retry_limit {
            match self.try_send(&meta_json, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = format!("{e:#}");
                    tracing::warn!(
                        chunk_index = meta.chunk_index,
                        attempt,
                        limit = self.settings.retry_limit,
                        error = %last_error,
                        "chunk upload attempt failed"
                    );
                    if attempt < self.settings.retry_limit {
                        tokio::time::sleep(self.settings.retry_delay()).await;
                    }
                }
            }
        }

        Err(ChunkFailure {
            index: meta.chunk_index,
            attempts: self.settings.retry_limit,
            error: last_error,
        })
    }

    async fn try_send(&self, meta_json: &str, payload: Bytes) -> Result<()> {
        let part = Part::stream(reqwest::Body::from(payload))
            .mime_str("application/octet-stream")
            .context("invalid chunk mime type")?;
        let form = Form::new()
            .text("meta", meta_json.to_string())
            .part("chunk", part);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(dir) = &self.remote_dir {
            request = request.query(&[("dir", dir)]);
        }

        let response = request.send().await.context("chunk request failed")?;
        response
            .error_for_status()
            .context("receiver rejected chunk")?;
        Ok(())
    }
}

fn chunk_endpoint(server_url: &str) -> String {
    format!("{}/api/upload/chunk", server_url.trim_end_matches('/'))
}

/// Sequential streaming pass over the file for the running whole-file
/// digest; never buffers more than one read block.
async fn digest_file(path: &Path) -> Result<u32> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))?;

    let mut running = Crc32::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).await.context("file read failed")?;
        if n == 0 {
            break;
        }
        running.update(&buffer[..n]);
    }

    Ok(running.finish())
}

/// Read exactly one planned span from the file.
async fn read_span(path: &Path, span: ChunkSpan) -> Result<Bytes> {
    if span.len == 0 {
        return Ok(Bytes::new());
    }

    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Cannot open {}", path.display()))?;
    file.seek(std::io::SeekFrom::Start(span.offset))
        .await
        .context("seek failed")?;

    let mut buffer = vec![0u8; span.len as usize];
    file.read_exact(&mut buffer)
        .await
        .with_context(|| format!("short read for chunk {}", span.index))?;

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        assert_eq!(
            chunk_endpoint("http://localhost:8080/"),
            "http://localhost:8080/api/upload/chunk"
        );
        assert_eq!(
            chunk_endpoint("http://localhost:8080"),
            "http://localhost:8080/api/upload/chunk"
        );
    }

    #[tokio::test]
    async fn digest_matches_one_shot_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 255) as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        assert_eq!(digest_file(&path).await.unwrap(), checksum::crc32(&data));
    }

    #[tokio::test]
    async fn read_span_returns_exact_slice() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let bytes = read_span(
            &path,
            ChunkSpan {
                index: 1,
                offset: 4,
                len: 3,
            },
        )
        .await
        .unwrap();
        assert_eq!(&bytes[..], b"456");

        let empty = read_span(
            &path,
            ChunkSpan {
                index: 0,
                offset: 0,
                len: 0,
            },
        )
        .await
        .unwrap();
        assert!(empty.is_empty());
    }
}
