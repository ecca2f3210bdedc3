//! Upload endpoint: PDF in, chunks into the index

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::UploadResponse;

/// POST /upload - Parse, chunk and index one document
///
/// Expects a multipart field named `file`.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read file data: {}", e)))?;

        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| Error::InvalidRequest("No file provided".to_string()))?;

    tracing::info!("Upload: {} ({} bytes)", filename, data.len());

    let ingest = state.ingest().clone();
    let name = filename.clone();
    let processed = tokio::task::spawn_blocking(move || ingest.process(&data, &name))
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?;

    let chunks = match processed {
        Ok(chunks) => chunks,
        Err(Error::FileParse { message, .. }) => {
            tracing::warn!("Could not read {}: {}", filename, message);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    if chunks.is_empty() {
        return Err(Error::InvalidRequest("Invalid or empty document".to_string()));
    }

    let chunks_added = state.index().add(chunks, &filename).await?;

    Ok(Json(UploadResponse {
        message: format!("Successfully processed {}", filename),
        chunks_added,
    }))
}
