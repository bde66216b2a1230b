use crate::config::CredentialStore;
use crate::llm::{ PromptMessage, UpstreamClient, UpstreamError };
use crate::models::chat::{ ChatReply, ChatTurn, CredentialCheckOutcome };

use chrono::Utc;
use log::{ info, warn };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Reply substituted when the provider answers success with no content.
pub const FALLBACK_REPLY: &str = "Unable to generate response";

const DEFAULT_PLATFORM: &str = "web";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("OpenAI API key not configured. Please set up in settings.")]
    MissingCredential,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Stateless one-shot relay between the chat frontend and the upstream
/// completion provider. Holds no per-conversation state; every invocation
/// is a single outbound call.
pub struct ChatRelay {
    client: Arc<dyn UpstreamClient>,
    credentials: Arc<dyn CredentialStore>,
    system_prompt: String,
}

impl ChatRelay {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        credentials: Arc<dyn CredentialStore>,
        system_prompt: String,
    ) -> Self {
        Self {
            client,
            credentials,
            system_prompt,
        }
    }

    /// Per-request header credential wins over the configured default.
    fn resolve_credential(&self, header_credential: Option<&str>) -> Result<String, RelayError> {
        header_credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| self.credentials.default_credential())
            .ok_or(RelayError::MissingCredential)
    }

    /// Prompt order is fixed: system instruction, caller history in order,
    /// then the new user turn.
    fn build_prompt(&self, history: &[ChatTurn], message: &str) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(PromptMessage {
            role: "system".to_string(),
            content: self.system_prompt.clone(),
        });
        for turn in history {
            messages.push(PromptMessage {
                role: turn.role.clone(),
                content: turn.content.clone(),
            });
        }
        messages.push(PromptMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });
        messages
    }

    pub async fn relay(
        &self,
        message: &str,
        history: &[ChatTurn],
        platform_id: Option<&str>,
        header_credential: Option<&str>,
    ) -> Result<ChatReply, RelayError> {
        if message.trim().is_empty() {
            return Err(RelayError::InvalidRequest("Message is required".to_string()));
        }

        let credential = self.resolve_credential(header_credential)?;
        let platform = platform_id.unwrap_or(DEFAULT_PLATFORM);

        // Credential value itself is never logged.
        info!(
            "Relaying chat message: platform={}, history_len={}, message_len={}",
            platform,
            history.len(),
            message.len()
        );

        let prompt = self.build_prompt(history, message);
        let completion = self.client.complete(&credential, &prompt).await?;

        let response = match completion.response.filter(|r| !r.is_empty()) {
            Some(text) => text,
            None => {
                warn!("Upstream returned no content, substituting fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };

        Ok(ChatReply {
            response,
            conversation_id: new_conversation_id(),
            platform: platform.to_string(),
            model: self.client.model(),
        })
    }

    pub async fn check_credential(
        &self,
        api_key: &str,
    ) -> Result<CredentialCheckOutcome, RelayError> {
        let key = api_key.trim();
        if key.is_empty() {
            return Err(RelayError::InvalidRequest("API key is required".to_string()));
        }

        match self.client.list_models(key).await {
            Ok(count) => {
                info!("Credential check passed: {} models available", count);
                Ok(CredentialCheckOutcome {
                    valid: true,
                    message: "API key is valid and working!".to_string(),
                    available_count: count,
                    details: None,
                    upstream_status: None,
                })
            }
            Err(UpstreamError::Status { code, message }) => {
                info!("Credential check rejected by upstream: status={}", code);
                Ok(CredentialCheckOutcome {
                    valid: false,
                    message: "Invalid API key. Please check and try again.".to_string(),
                    available_count: 0,
                    details: Some(message),
                    upstream_status: Some(code),
                })
            }
            Err(e) => Err(RelayError::Upstream(e)),
        }
    }
}

/// Opaque per-call identifier. Time-based with a random tail so two calls
/// in the same millisecond still differ.
fn new_conversation_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let tag = Uuid::new_v4().simple().to_string();
    format!("conv_{}-{}", millis, &tag[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticCredentialStore;
    use crate::llm::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    enum StubBehavior {
        Reply(Option<String>),
        Fail { code: u16, message: String },
    }

    struct StubClient {
        behavior: StubBehavior,
        model_count: usize,
        calls: AtomicUsize,
        seen: Mutex<Vec<PromptMessage>>,
    }

    impl StubClient {
        fn replying(text: &str) -> Self {
            Self::with_behavior(StubBehavior::Reply(Some(text.to_string())))
        }

        fn with_behavior(behavior: StubBehavior) -> Self {
            Self {
                behavior,
                model_count: 0,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn with_models(count: usize) -> Self {
            Self {
                behavior: StubBehavior::Reply(None),
                model_count: count,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamClient for StubClient {
        async fn complete(
            &self,
            _credential: &str,
            messages: &[PromptMessage],
        ) -> Result<CompletionResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend_from_slice(messages);
            match &self.behavior {
                StubBehavior::Reply(text) =>
                    Ok(CompletionResponse { response: text.clone() }),
                StubBehavior::Fail { code, message } =>
                    Err(UpstreamError::Status { code: *code, message: message.clone() }),
            }
        }

        async fn list_models(&self, _credential: &str) -> Result<usize, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                StubBehavior::Fail { code, message } =>
                    Err(UpstreamError::Status { code: *code, message: message.clone() }),
                StubBehavior::Reply(_) => Ok(self.model_count),
            }
        }

        fn model(&self) -> String {
            "stub-model".to_string()
        }
    }

    fn relay_with(client: Arc<StubClient>, default_key: &str) -> ChatRelay {
        ChatRelay::new(
            client,
            Arc::new(StaticCredentialStore::new(default_key)),
            "You are a helpful assistant.".to_string(),
        )
    }

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn missing_credential_never_calls_upstream() {
        let client = Arc::new(StubClient::replying("Hello!"));
        let relay = relay_with(client.clone(), "");

        let err = relay.relay("Hi", &[], None, None).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_message_is_invalid_regardless_of_credential() {
        let client = Arc::new(StubClient::replying("Hello!"));
        let relay = relay_with(client.clone(), "sk-default");

        for message in ["", "   "] {
            let err = relay.relay(message, &[], None, Some("sk-header")).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidRequest(_)));
        }

        // Also invalid with no credential at all; the message check wins.
        let bare = relay_with(client.clone(), "");
        let err = bare.relay("", &[], None, None).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_relay_returns_reply_with_fresh_ids() {
        let client = Arc::new(StubClient::replying("Hello!"));
        let relay = relay_with(client.clone(), "");

        let first = relay.relay("Hi", &[], Some("test"), Some("valid-cred")).await.unwrap();
        assert_eq!(first.response, "Hello!");
        assert_eq!(first.platform, "test");
        assert_eq!(first.model, "stub-model");
        assert!(!first.conversation_id.is_empty());

        let second = relay.relay("Hi", &[], Some("test"), Some("valid-cred")).await.unwrap();
        assert_ne!(first.conversation_id, second.conversation_id);
    }

    #[tokio::test]
    async fn prompt_preserves_history_order() {
        let client = Arc::new(StubClient::replying("ok"));
        let relay = relay_with(client.clone(), "sk-default");

        let history = vec![turn("user", "A"), turn("assistant", "B")];
        relay.relay("C", &history, None, None).await.unwrap();

        let seen = client.seen.lock().unwrap();
        let roles: Vec<&str> = seen.iter().map(|m| m.role.as_str()).collect();
        let contents: Vec<&str> = seen.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(contents[1..], ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn upstream_status_error_is_surfaced() {
        let client = Arc::new(StubClient::with_behavior(StubBehavior::Fail {
            code: 401,
            message: "invalid key".to_string(),
        }));
        let relay = relay_with(client, "sk-default");

        let err = relay.relay("Hi", &[], None, None).await.unwrap_err();
        match err {
            RelayError::Upstream(UpstreamError::Status { code, message }) => {
                assert_eq!(code, 401);
                assert!(message.contains("invalid key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_upstream_content_degrades_to_fallback() {
        let client = Arc::new(StubClient::with_behavior(StubBehavior::Reply(None)));
        let relay = relay_with(client, "sk-default");

        let reply = relay.relay("Hi", &[], None, None).await.unwrap();
        assert_eq!(reply.response, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn header_credential_overrides_default() {
        let client = Arc::new(StubClient::replying("ok"));
        let relay = relay_with(client.clone(), "");

        // Default store is empty, so only the header can authorize this.
        let reply = relay.relay("Hi", &[], None, Some("sk-header")).await;
        assert!(reply.is_ok());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn credential_check_rejects_empty_key_without_network() {
        let client = Arc::new(StubClient::with_models(3));
        let relay = relay_with(client.clone(), "");

        let err = relay.check_credential("  ").await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn credential_check_counts_available_models() {
        let client = Arc::new(StubClient::with_models(3));
        let relay = relay_with(client, "");

        let outcome = relay.check_credential("sk-validlooking").await.unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.available_count, 3);
    }

    #[tokio::test]
    async fn credential_check_reports_upstream_rejection_as_invalid() {
        let client = Arc::new(StubClient::with_behavior(StubBehavior::Fail {
            code: 401,
            message: "Incorrect API key provided".to_string(),
        }));
        let relay = relay_with(client, "");

        let outcome = relay.check_credential("sk-bad").await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.upstream_status, Some(401));
        assert_eq!(outcome.details.as_deref(), Some("Incorrect API key provided"));
    }
}
