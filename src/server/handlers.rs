use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ocr::Recognizer;
use crate::pipeline::Submitter;
use crate::settings::Settings;

use super::auth::login;
use super::chat::chat;
use super::pages::index;
use super::recognize::recognize;
use super::state::ServerState;

pub async fn run_server(
    settings: Settings,
    addr: String,
    secret: Option<String>,
    submitter: Arc<dyn Submitter>,
    recognizer: Arc<dyn Recognizer>,
) -> Result<()> {
    let state = Arc::new(ServerState {
        settings,
        secret,
        submitter,
        recognizer,
    });
    if state.secret.is_none() {
        warn!("PRIVATE_ACCESS_PASSWORD is not set; every login will be rejected");
    }
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    let upload_limit = state.settings.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/login", post(login))
        .route("/api/chat", post(chat))
        .route("/api/recognize", post(recognize))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}
