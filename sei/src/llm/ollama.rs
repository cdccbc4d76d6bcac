//! Ollama-style chat endpoint client
//!
//! POSTs `{model, messages}` and decodes whatever body comes back, whether a
//! single JSON document or newline-delimited chunks.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, LlmClient, LlmError};
use crate::config::LlmConfig;
use crate::reply::decode_body;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Chat client for an Ollama-compatible `/api/chat` endpoint
pub struct OllamaClient {
    model: String,
    url: String,
    api_key: Option<String>,
    http: Client,
    initial_backoff: Duration,
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            url: config.chat_url(),
            api_key: config.api_key(),
            http,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Build the request body; the system prompt is always the first message
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, "build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "messages": request.wire_messages(),
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, LlmError> {
        let mut builder = self
            .http
            .post(&self.url)
            .header("content-type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        if status == 429 {
            debug!("send_once: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "send_once: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let mut stream = response.bytes_stream();
        let mut raw = Vec::new();
        let mut chunk_count = 0usize;
        while let Some(chunk) = stream.next().await {
            raw.extend_from_slice(&chunk?);
            chunk_count += 1;
        }
        debug!(chunk_count, byte_count = raw.len(), "send_once: body received");

        let body = String::from_utf8(raw)
            .map_err(|e| LlmError::InvalidResponse(format!("Response body is not UTF-8: {}", e)))?;

        Ok(decode_body(&body))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(%self.model, url = %self.url, "complete: called");
        let body = self.build_request_body(&request);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = self.initial_backoff * 2u32.pow(attempt - 1);
                warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "complete: retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.send_once(&body).await {
                Ok(reply) => {
                    debug!(reply_len = reply.len(), "complete: success");
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    debug!(attempt, error = %e, "complete: transient error");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}
