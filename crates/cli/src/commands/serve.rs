//! `switchyard serve`: Start the HTTP API server.

use std::sync::Arc;

use switchyard_agent::AgentRuntime;
use switchyard_config::AppConfig;
use switchyard_providers::ProviderMode;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let runtime = Arc::new(AgentRuntime::from_config(config).await);
    let config = runtime.config();

    println!("🚉 Switchyard Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:   {}", runtime.provider_name());
    if runtime.provider_mode() == ProviderMode::Mock {
        println!("   ⚠️  No API key found, answering with the offline mock provider");
    }
    println!("   Knowledge:  {}", config.knowledge.root_url);
    println!("   Index:      {}", runtime.knowledge_status().state().as_str());

    switchyard_gateway::start(runtime).await?;

    Ok(())
}
