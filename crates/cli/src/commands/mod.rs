pub mod ask;
pub mod config_cmd;
pub mod run;
pub mod status;

use second_config::AppConfig;
use std::path::Path;

/// Load from `path` when given, else from the default location. Environment
/// overrides and validation apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let loaded = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    };
    Ok(loaded.map_err(|e| format!("Failed to load config: {e}"))?)
}
