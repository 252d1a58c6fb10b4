use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::GenericImageView;
use std::sync::Arc;
use tracing::debug;

use crate::crop::{UploadFile, decode_upload, extract};
use crate::error::{ErrorKind, PipelineError};
use crate::geometry::CropRect;
use crate::ocr::finalize_text;

use super::auth::require_auth;
use super::models::{RecognizeRequest, RecognizeResponse};
use super::state::{ServerError, ServerState};

impl From<PipelineError> for ServerError {
    fn from(err: PipelineError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidFileType | ErrorKind::Extraction => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Ocr | ErrorKind::Submission => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Crops the posted image and runs OCR on the selection.
pub(crate) async fn recognize(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    payload: Result<Json<RecognizeRequest>, JsonRejection>,
) -> Result<Json<RecognizeResponse>, ServerError> {
    require_auth(&headers, &state)?;
    let Json(payload) = payload?;
    let bytes = decode_image_payload(&payload.image_base64)?;
    let rect = payload
        .crop
        .map(|crop| CropRect::new(crop.x, crop.y, crop.width, crop.height))
        .unwrap_or_default();
    let (mime, display) = (payload.mime, payload.display);

    // Camera photos take a while to decode; keep that off the async workers.
    let image = tokio::task::spawn_blocking(move || {
        let file = UploadFile::new(bytes, mime.as_deref(), None);
        let mut source = decode_upload(&file)?;
        if let Some(display) = display {
            source.set_display(display);
        }
        extract(&source, rect)
    })
    .await
    .map_err(|err| ServerError::internal(format!("image task failed: {}", err)))??;
    debug!(?rect, size = ?image.dimensions(), "running OCR for upload");
    let raw = state
        .recognizer
        .recognize(image, &state.settings.ocr_languages)
        .await
        .map_err(|err| PipelineError::Ocr(format!("{:#}", err)))?;
    Ok(Json(RecognizeResponse {
        text: finalize_text(&raw),
    }))
}

/// Accepts plain base64 or a `data:` URL as produced by `FileReader`.
fn decode_image_payload(value: &str) -> Result<Vec<u8>, ServerError> {
    let encoded = match value.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => value,
    };
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(ServerError::bad_request("image_base64 is required"));
    }
    BASE64
        .decode(encoded)
        .map_err(|err| ServerError::bad_request(format!("invalid base64 image: {}", err)))
}
