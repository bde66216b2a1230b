pub mod openai;

use async_trait::async_trait;
use serde::{ Serialize, Deserialize };
use thiserror::Error;

/// Failure of a single upstream provider call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream transport error: {0}")]
    Transport(String),
}

/// One element of the prompt sequence forwarded upstream. Matches the
/// provider's message shape on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// A successful completion. `response` is `None` when the provider
/// answered 2xx but produced no content; the caller decides policy.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub response: Option<String>,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Forward an ordered prompt sequence and return the first generated
    /// reply. The credential is supplied per call and never stored.
    async fn complete(
        &self,
        credential: &str,
        messages: &[PromptMessage],
    ) -> Result<CompletionResponse, UpstreamError>;

    /// Lightweight capability-listing call used to validate a credential.
    /// Returns the number of models the credential can see.
    async fn list_models(&self, credential: &str) -> Result<usize, UpstreamError>;

    fn model(&self) -> String;
}
