use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::Deserialize;
use std::time::Duration;

use super::{ CompletionResponse, PromptMessage, UpstreamClient, UpstreamError };

pub struct OpenAiChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiModelList {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAiErrorEnvelope {
    error: Option<OpenAiErrorBody>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let chat_model = model.unwrap_or_else(|| "gpt-3.5-turbo".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            temperature,
            max_tokens,
        })
    }

    fn map_transport(e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }

    /// Turn a non-2xx response into a status error carrying the provider's
    /// own error message verbatim, falling back to the raw body text.
    async fn status_error(resp: reqwest::Response) -> UpstreamError {
        let code = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenAiErrorEnvelope>(&body)
            .ok()
            .and_then(|env| env.error)
            .and_then(|e| e.message)
            .unwrap_or(body);
        UpstreamError::Status { code, message }
    }
}

#[async_trait]
impl UpstreamClient for OpenAiChatClient {
    async fn complete(
        &self,
        credential: &str,
        messages: &[PromptMessage],
    ) -> Result<CompletionResponse, UpstreamError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let req = OpenAiChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self.http.post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", credential))
            .json(&req)
            .send()
            .await
            .map_err(Self::map_transport)?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }

        let body = resp.json::<OpenAiChatResponse>()
            .await
            .map_err(Self::map_transport)?;

        let content = body.choices.into_iter().next().and_then(|c| c.message.content);
        if content.is_none() {
            info!("Upstream completion returned no content");
        }

        Ok(CompletionResponse { response: content })
    }

    async fn list_models(&self, credential: &str) -> Result<usize, UpstreamError> {
        let url = format!("{}/v1/models", self.base_url.trim_end_matches('/'));

        let resp = self.http.get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", credential))
            .send()
            .await
            .map_err(Self::map_transport)?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }

        let body = resp.json::<OpenAiModelList>()
            .await
            .map_err(Self::map_transport)?;

        Ok(body.data.len())
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
