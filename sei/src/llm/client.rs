//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, LlmError};

/// Stateless chat client - each call is independent
///
/// Implementations own transport and response-shape decoding. The returned
/// string is the decoded, trimmed reply and may be empty; `Err` means no
/// reply was obtained at all.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
