use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use super::{Message, Provider, ProviderFuture, ProviderResponse, ProviderUsage, get_env};

pub const DEFAULT_BASE_URL: &str = "https://models.inference.ai.azure.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    base_url: Option<String>,
    messages: Vec<Message>,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            messages: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = Some(base_url.trim_end_matches('/').to_string());
        }
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `OPENAI_BASE_URL` overrides anything configured.
    fn base_url(&self) -> String {
        get_env("OPENAI_BASE_URL")
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    fn request_body(&self) -> serde_json::Value {
        let messages = self
            .messages
            .iter()
            .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
            .collect::<Vec<_>>();
        json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

impl Provider for OpenAI {
    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn complete(self) -> ProviderFuture {
        Box::pin(async move { call_chat_completions(self).await })
    }
}

async fn call_chat_completions(provider: OpenAI) -> Result<ProviderResponse> {
    let client = reqwest::Client::new();
    let url = format!("{}/chat/completions", provider.base_url());
    let body = provider.request_body();
    debug!(model = %provider.model, %url, "sending chat completion");

    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = client
            .post(&url)
            .bearer_auth(&provider.key)
            .json(&body)
            .send()
            .await
            .with_context(|| "failed to reach chat completion endpoint")?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return extract_chat_response(&text, &provider.model);
        }
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff("OpenAI", attempt, delay, retry_after).await;
            continue;
        }
        return Err(anyhow!(
            "OpenAI API error ({}): {}",
            status,
            extract_openai_error(&text).unwrap_or(text)
        ));
    }
}

fn extract_chat_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: OpenAIResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no message content returned from OpenAI"))?;

    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(ProviderResponse {
        text: content.trim().to_string(),
        model,
        usage,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, error.code))
}

fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    let mut parts = Vec::new();
    if let Some(message) = present(message) {
        parts.push(message);
    }
    if let Some(kind) = present(kind) {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = present(code) {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn openai_extract_chat_response_snapshot() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_chat_response.json"
        ));
        let response = extract_chat_response(payload, DEFAULT_MODEL).unwrap();
        assert_json_snapshot!(response, @r#"
        {
          "text": "Albert Einstein",
          "model": "gpt-4o-2024-08-06",
          "usage": {
            "prompt_tokens": 143,
            "completion_tokens": 3,
            "total_tokens": 146
          }
        }
        "#);
    }

    #[test]
    fn missing_content_is_an_error() {
        let payload = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(extract_chat_response(payload, DEFAULT_MODEL).is_err());
    }

    #[test]
    fn falls_back_to_requested_model() {
        let payload = r#"{"choices": [{"message": {"content": " Marie Curie \n"}}]}"#;
        let response = extract_chat_response(payload, "gpt-4o").unwrap();
        assert_eq!(response.text, "Marie Curie");
        assert_eq!(response.model.as_deref(), Some("gpt-4o"));
        assert!(response.usage.is_none());
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"error": {"message": "Bad key", "type": "invalid_request_error", "code": null}}"#;
        assert_eq!(
            extract_openai_error(body).as_deref(),
            Some("Bad key | type: invalid_request_error")
        );
        assert_eq!(extract_openai_error("not json"), None);
    }

    #[test]
    fn request_body_keeps_message_order() {
        let provider = OpenAI::new("key")
            .append_system_input("system".to_string())
            .append_user_input("riddle".to_string());
        let body = provider.request_body();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "riddle");
    }
}
