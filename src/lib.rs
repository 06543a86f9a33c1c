pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod session;
pub mod store;

use cli::Args;
use config::RelayConfig;
use llm::chat::ProviderRegistry;
use log::info;
use relay::Relay;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = RelayConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Max Duration: {:?}", config.max_duration);
    info!("Configured Providers: {:?}", config.configured_providers());
    let prompt_source = match (&args.prompts_path, &args.system_prompt) {
        (Some(path), _) => path.as_str(),
        (None, Some(_)) => "SYSTEM_PROMPT",
        (None, None) => "built-in",
    };
    info!("Prompt Source: {}", prompt_source);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let relay = Arc::new(Relay::new(config, ProviderRegistry::standard()));
    let server = Server::new(args.server_addr.clone(), relay, args);
    server.run().await?;

    Ok(())
}
