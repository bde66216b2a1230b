use serde::{ Serialize, Deserialize };

/// One turn of caller-supplied conversation history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(rename = "conversationContext")]
    pub conversation_context: Option<Vec<ChatTurn>>,
    #[serde(rename = "platformId")]
    pub platform_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    pub platform: String,
    pub model: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CredentialCheckRequest {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

/// Result of probing the upstream provider with a candidate credential.
/// A non-success upstream response counts as an invalid credential rather
/// than a relay failure; the upstream status and detail are kept so the
/// API layer can pass them through.
#[derive(Clone, Debug)]
pub struct CredentialCheckOutcome {
    pub valid: bool,
    pub message: String,
    pub available_count: usize,
    pub details: Option<String>,
    pub upstream_status: Option<u16>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
