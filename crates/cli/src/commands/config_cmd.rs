//! `switchyard config`: Configuration management commands.

use std::path::Path;

use switchyard_config::AppConfig;

use super::config_file;

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut redacted = config.clone();
    if redacted.api_key.is_some() {
        redacted.api_key = Some("[REDACTED]".into());
    }
    for provider in redacted.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    println!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}

pub fn validate(
    config: Result<AppConfig, Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ {e}");
            return Err("invalid configuration".into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set SWITCHYARD_API_KEY or OPENAI_API_KEY); the mock provider will answer");
    }
    if config.gateway.allowed_origins.is_empty() {
        warnings.push("gateway.allowed_origins is empty; browsers will be refused by CORS");
    }
    if config.knowledge.index_path.is_none() {
        warnings.push("knowledge.index_path is not set; the index is rebuilt on every start");
    }
    if config.knowledge.refresh_interval_minutes == 0 {
        warnings.push("Periodic knowledge refresh is disabled");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:   {}", config.default_provider);
    println!("   Model:      {}", config.default_model);
    println!("   Gateway:    {}:{}", config.gateway.host, config.gateway.port);
    println!("   Knowledge:  {}", config.knowledge.root_url);
    Ok(())
}

pub fn path(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_file(explicit).display());
    Ok(())
}

pub fn init(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_file(explicit);
    if path.exists() {
        println!("⚠️  {} already exists, leaving it untouched", path.display());
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}
