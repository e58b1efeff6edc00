//! `switchyard status`: Show system status.

use switchyard_agent::AgentRuntime;
use switchyard_config::AppConfig;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    let index_path = config.knowledge.index_path.clone();
    let runtime = AgentRuntime::from_config(config).await;
    let config = runtime.config();

    println!("🚉 Switchyard Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {} ({:?})", runtime.provider_name(), runtime.provider_mode());
    println!("  Model:        {}", config.default_model);
    println!("  Embeddings:   {}", config.embedding_model);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Rate limit:   {}/min", config.gateway.rate_limit_per_minute);
    println!("  Router:       threshold {:.2}", config.router.threshold);
    println!("  Help center:  {}", config.knowledge.root_url);
    match &index_path {
        Some(path) => println!("  Index file:   {}", path.display()),
        None => println!("  Index file:   (in-memory)"),
    }
    println!("  Chunks:       {}", runtime.index().count().await?);
    println!("  Knowledge:    {}", runtime.knowledge_status().state().as_str());
    match runtime.refresh_interval() {
        Some(period) => println!("  Refresh:      every {} min", period.as_secs() / 60),
        None => println!("  Refresh:      disabled"),
    }

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `switchyard config init` to create one");
    }

    Ok(())
}
