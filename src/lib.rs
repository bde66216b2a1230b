pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use cli::Args;
use config::StaticCredentialStore;
use llm::openai::OpenAiChatClient;
use log::info;
use relay::ChatRelay;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Upstream Timeout: {}s", args.upstream_timeout_secs);
    info!("Default API Key Configured: {}", !args.openai_api_key.trim().is_empty());
    info!("-------------------------");

    let client = OpenAiChatClient::new(
        Some(args.chat_model.clone()),
        Some(args.chat_base_url.clone()),
        args.temperature,
        args.max_tokens,
        Duration::from_secs(args.upstream_timeout_secs),
    )?;
    let credentials = Arc::new(StaticCredentialStore::new(&args.openai_api_key));
    let relay = Arc::new(ChatRelay::new(
        Arc::new(client),
        credentials,
        args.system_prompt.clone(),
    ));

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay);
    server.run().await?;

    Ok(())
}
