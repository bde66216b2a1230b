/// Server-side source for the default upstream credential. Injected into
/// the relay so the secret never lives in process-wide mutable state.
pub trait CredentialStore: Send + Sync {
    fn default_credential(&self) -> Option<String>;
}

/// Credential fixed at startup from CLI/env configuration. An empty or
/// whitespace-only value means no default is configured.
pub struct StaticCredentialStore {
    credential: Option<String>,
}

impl StaticCredentialStore {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let credential = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        Self { credential }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn default_credential(&self) -> Option<String> {
        self.credential.clone()
    }
}
