//! `agora serve` — Start the HTTP gateway.

use agora_config::AppConfig;
use agora_core::Error;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    tracing::debug!(config = ?config, "Configuration loaded");

    if !config.has_api_key() {
        return Err("No API key configured — set api_key in config.toml or OPENAI_API_KEY".into());
    }

    println!("🏛️  Agora Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model: {}", config.model);
    println!("   Allowed origins: {}", config.gateway.allowed_origins.join(", "));

    agora_gateway::start(config).await?;

    Ok(())
}
