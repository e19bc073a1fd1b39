use crate::io_struct::{ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl};
use log::{debug, error};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = "You are an expert tutor analyzing problems from images. \
Return a valid JSON array: [{ step: 1, explaination: \"...\" }, ...]. \
Include a final step with \"The final answer is X\". \
Do not use markdown or formatting symbols.";

const USER_PROMPT_SUFFIX: &str = "\nPlease explain step-by-step.";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    /// 2xx answer without `choices[0].message.content`; carries the whole body.
    #[error("Upstream response has no message content")]
    MissingContent { raw: Value },
}

impl UpstreamError {
    /// HTTP status to report back to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamError::Status { status, .. } => *status,
            UpstreamError::Transport(e) => e.status().map(|s| s.as_u16()).unwrap_or(500),
            // Answered as a 200 payload by the handler; 500 only if surfaced as an error.
            UpstreamError::MissingContent { .. } => 500,
        }
    }
}

/// One-shot caller for the chat-completions endpoint.
///
/// Holds the pooled HTTP client; cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Some(Duration::from_secs(50)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn build_request(&self, prompt_text: &str, image_url: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::System {
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text {
                            text: format!("{}{}", prompt_text, USER_PROMPT_SUFFIX),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_url.to_string(),
                            },
                        },
                    ],
                },
            ],
        }
    }

    /// Sends a single request and returns the trimmed message content. No retries.
    pub async fn call(&self, prompt_text: &str, image_url: &str) -> Result<String, UpstreamError> {
        let payload = self.build_request(prompt_text, image_url);
        debug!(
            "Calling upstream {} with model {}",
            self.config.url, self.config.model
        );

        let resp = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            let message = extract_error_message(status.as_u16(), &body);
            error!("Upstream returned {}: {}", status, message);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.bytes().await?;
        completion_content(&body)
    }
}

/// Content of a 2xx body. A body that is not JSON is kept as a string in `raw`.
pub fn completion_content(body: &[u8]) -> Result<String, UpstreamError> {
    let raw = serde_json::from_slice::<Value>(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
    match message_content(&raw) {
        Some(content) => Ok(content.to_string()),
        None => Err(UpstreamError::MissingContent { raw }),
    }
}

/// `choices[0].message.content`, trimmed; `None` when absent or blank.
pub fn message_content(raw: &Value) -> Option<&str> {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|content| !content.is_empty())
}

/// Prefers the upstream's own `error.message` (or top-level `message`).
pub fn extract_error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| format!("Request failed with status code {}", status))
}
