//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Transport-level failures talking to the model endpoint
///
/// Any of these means "no reply", which is distinct from an empty reply.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => false,
            LlmError::ApiError { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            LlmError::Network(e) => !e.is_builder(),
            LlmError::Timeout(_) => false,
            LlmError::InvalidResponse(_) => false,
        }
    }
}
