use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::{SubmitFuture, Submitter};

use super::auth::AUTH_COOKIE;
use super::models::{ChatRequest, ChatResponse, ErrorResponse, LoginRequest};

/// Submits riddles to a running server, logging in on first use.
#[derive(Clone)]
pub struct HttpSubmitter {
    base_url: String,
    password: String,
    client: reqwest::Client,
    token: Arc<Mutex<Option<String>>>,
}

impl HttpSubmitter {
    pub fn new(base_url: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            password: password.into(),
            client: reqwest::Client::new(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn session_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        let fresh = self.login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    async fn login(&self) -> Result<String> {
        let url = format!("{}/api/login", self.base_url);
        debug!(%url, "logging in");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                password: self.password.clone(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(PipelineError::Unauthorized("login rejected by server".to_string()).into());
        }
        if !response.status().is_success() {
            return Err(anyhow!("login failed ({})", response.status()));
        }
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_session_cookie)
            .ok_or_else(|| anyhow!("server did not return a session cookie"))
    }

    async fn solve(&self, text: String) -> Result<String> {
        let token = self.session_token().await?;
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(COOKIE, format!("{}={}", AUTH_COOKIE, token))
            .json(&ChatRequest { text })
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.token.lock().await.take();
            return Err(PipelineError::Unauthorized("session was rejected".to_string()).into());
        }
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|error| error.error)
                .unwrap_or(body);
            return Err(anyhow!("{} ({})", message, status));
        }
        let payload: ChatResponse =
            serde_json::from_str(&body).with_context(|| "failed to parse chat response")?;
        Ok(payload.response)
    }
}

impl Submitter for HttpSubmitter {
    fn submit(&self, text: String) -> SubmitFuture {
        let submitter = self.clone();
        Box::pin(async move { submitter.solve(text).await })
    }
}

fn parse_session_cookie(header: &str) -> Option<String> {
    let (name, value) = header.split(';').next()?.trim().split_once('=')?;
    (name == AUTH_COOKIE && !value.is_empty()).then(|| value.to_string())
}
