pub mod chat;
pub mod config_cmd;
pub mod ingest;
pub mod serve;
pub mod status;

use std::path::Path;

use switchyard_config::AppConfig;

/// Load from an explicit path, or from `~/.switchyard/config.toml` with
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Where the config file lives for this invocation.
pub fn config_file(path: Option<&Path>) -> std::path::PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}
