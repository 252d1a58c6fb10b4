use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::auth::require_auth;
use super::models::{ChatRequest, ChatResponse};
use super::state::{ServerError, ServerState};

pub(crate) async fn chat(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    require_auth(&headers, &state)?;
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ServerError::bad_request("text is required"));
    }

    info!(chars = text.chars().count(), "solving riddle");
    match state.submitter.submit(text.to_string()).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(err) => {
            warn!("riddle request failed: {:#}", err);
            Err(ServerError::internal(format!(
                "Failed to process request: {:#}",
                err
            )))
        }
    }
}
