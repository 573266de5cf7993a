//! Config loader: reads `~/.gigabot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.gigabot/config.json`
//! 3. Environment variables `GIGABOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `GIGABOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `GIGABOT_GIGACHAT__OAUTH_URL` → `gigachat.oauth_url`
/// - `GIGABOT_GIGACHAT__CHAT_URL` → `gigachat.chat_url`
/// - `GIGABOT_GIGACHAT__AUTHORIZATION_KEY` → `gigachat.authorization_key`
/// - `GIGABOT_GIGACHAT__SCOPE` → `gigachat.scope`
/// - `GIGABOT_GIGACHAT__MODEL` → `gigachat.model`
/// - `GIGABOT_GIGACHAT__REQUEST_TIMEOUT_SECS` → `gigachat.request_timeout_secs`
/// - `GIGABOT_GIGACHAT__PROACTIVE_REFRESH` → `gigachat.proactive_refresh`
/// - `GIGABOT_TELEGRAM__TOKEN` → `telegram.token`
/// - `GIGABOT_TELEGRAM__USERNAME` → `telegram.username`
fn apply_env_overrides(mut config: Config) -> Config {
    let gc = &mut config.gigachat;
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__OAUTH_URL") {
        gc.oauth_url = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__CHAT_URL") {
        gc.chat_url = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__AUTHORIZATION_KEY") {
        gc.authorization_key = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__SCOPE") {
        gc.scope = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__MODEL") {
        gc.model = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__REQUEST_TIMEOUT_SECS") {
        match val.parse::<u64>() {
            Ok(n) => gc.request_timeout_secs = n,
            Err(_) => warn!(value = %val, "ignoring invalid GIGABOT_GIGACHAT__REQUEST_TIMEOUT_SECS"),
        }
    }
    if let Ok(val) = std::env::var("GIGABOT_GIGACHAT__PROACTIVE_REFRESH") {
        gc.proactive_refresh = val == "true" || val == "1";
    }

    if let Ok(val) = std::env::var("GIGABOT_TELEGRAM__TOKEN") {
        config.telegram.token = val;
    }
    if let Ok(val) = std::env::var("GIGABOT_TELEGRAM__USERNAME") {
        config.telegram.username = val;
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
