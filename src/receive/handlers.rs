//! HTTP handler for chunk intake.

use axum::extract::{Query, State};
use axum::Json;
use axum_typed_multipart::{TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use serde::Deserialize;

use crate::common::AppError;
use crate::protocol::{ChunkAck, ChunkMeta};
use crate::receive::finalizer;
use crate::receive::session::{SessionKey, UploadSession};
use crate::receive::writer::{self, WriteOutcome};
use crate::server::state::AppState;
use crate::utils::security;

/// Multipart payload for one chunk upload: JSON metadata plus raw bytes.
#[derive(TryFromMultipart)]
pub struct ChunkUploadRequest {
    /// JSON-encoded [`ChunkMeta`].
    pub meta: String,
    #[form_data(limit = "12MiB")]
    pub chunk: Bytes,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    /// Target subdirectory relative to the base directory.
    pub dir: Option<String>,
}

/// Accept, verify, and persist one uploaded chunk; finalize the transfer
/// when this chunk completes it.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    TypedMultipart(payload): TypedMultipart<ChunkUploadRequest>,
) -> Result<Json<ChunkAck>, AppError> {
    if state.read_only {
        return Err(AppError::ReadOnly);
    }

    let meta: ChunkMeta = serde_json::from_str(&payload.meta)
        .map_err(|e| AppError::BadRequest(format!("invalid chunk metadata: {e}")))?;
    meta.validate().map_err(AppError::BadRequest)?;

    let target_path =
        security::confine_target_path(&state.base_dir, query.dir.as_deref(), &meta.file_name)
            .map_err(|e| AppError::BadRequest(format!("bad path: {e}")))?;

    // Lazily create the session on first chunk arrival; there is no
    // explicit "start" call in the protocol.
    let key = SessionKey::new(&meta.file_name, meta.total_size);
    let handle = state.registry.resolve(key.clone(), || {
        tracing::info!(
            file = %meta.file_name,
            total_chunks = meta.total_chunks,
            total_size = meta.total_size,
            target = %target_path.display(),
            "started chunked upload"
        );
        UploadSession::new(
            meta.file_name.clone(),
            target_path.clone(),
            meta.total_chunks,
            meta.total_size,
        )
    })?;

    let mut session = handle.lock().await;

    // A colliding (name, size) stream aimed at a different directory must
    // not write into this session's destination.
    if session.target_path() != target_path.as_path() {
        return Err(AppError::BadRequest(format!(
            "active session for {} targets a different directory",
            meta.file_name
        )));
    }

    let outcome = writer::write_chunk(&mut session, &meta, &payload.chunk).await?;
    handle.touch();

    if session.is_complete() {
        finalizer::finalize(&mut session).await?;
        drop(session);
        state.registry.remove(&key);
        return Ok(Json(ChunkAck {
            success: true,
            duplicate: false,
            completed: true,
        }));
    }

    Ok(Json(ChunkAck {
        success: true,
        duplicate: outcome == WriteOutcome::Duplicate,
        completed: false,
    }))
}
