use crate::llm::UpstreamError;
use crate::models::chat::{ ChatRequest, CredentialCheckRequest, ErrorBody };
use crate::relay::{ ChatRelay, RelayError };

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::State,
    response::{ IntoResponse, Response },
    http::{ HeaderMap, StatusCode },
};
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

/// Per-request credential override header.
pub const CREDENTIAL_HEADER: &str = "x-openai-key";

#[derive(Clone)]
struct AppState {
    relay: Arc<ChatRelay>,
}

pub fn build_router(relay: Arc<ChatRelay>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/credential-check", post(credential_check_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn start_http_server(
    addr: &str,
    relay: Arc<ChatRelay>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = build_router(relay);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let header_credential = headers
        .get(CREDENTIAL_HEADER)
        .and_then(|v| v.to_str().ok());

    let message = req.message.as_deref().unwrap_or("");
    let history = req.conversation_context.unwrap_or_default();

    match state.relay
        .relay(message, &history, req.platform_id.as_deref(), header_credential)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => chat_error_response(err),
    }
}

fn chat_error_response(err: RelayError) -> Response {
    let (code, message) = match &err {
        RelayError::InvalidRequest(_) | RelayError::MissingCredential => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        RelayError::Upstream(UpstreamError::Status { code, message }) => (
            StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
            format!("Failed to process message with AI. {}", message),
        ),
        RelayError::Upstream(UpstreamError::Timeout) => (
            StatusCode::GATEWAY_TIMEOUT,
            "Failed to process message with AI. The request timed out.".to_string(),
        ),
        RelayError::Upstream(UpstreamError::Transport(detail)) => (
            StatusCode::BAD_GATEWAY,
            format!("Failed to process message with AI. {}", detail),
        ),
    };

    error!("Chat relay error: {}", err);
    (code, Json(ErrorBody { error: message })).into_response()
}

async fn credential_check_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialCheckRequest>,
) -> Response {
    let api_key = req.api_key.as_deref().unwrap_or("");

    match state.relay.check_credential(api_key).await {
        Ok(outcome) if outcome.valid => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": outcome.message,
                "modelsAvailable": outcome.available_count,
            })),
        ).into_response(),
        Ok(outcome) => {
            let code = outcome.upstream_status
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (
                code,
                Json(json!({
                    "success": false,
                    "message": outcome.message,
                    "details": outcome.details,
                })),
            ).into_response()
        }
        Err(err) => {
            let (code, message) = match &err {
                RelayError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                RelayError::Upstream(UpstreamError::Timeout) => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Error testing API key. The request timed out.".to_string(),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "Error testing API key. Check your internet connection.".to_string(),
                ),
            };
            error!("Credential check error: {}", err);
            (code, Json(json!({ "success": false, "message": message }))).into_response()
        }
    }
}
