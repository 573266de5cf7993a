//! `gigabot onboard`: create the config file and data directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use gigabot_core::config::{get_config_path, save_config, Config};
use gigabot_core::utils::get_data_path;

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    println!();
    println!("{}", "Gigabot Setup".cyan().bold());
    println!();

    let path = config_path.unwrap_or_else(get_config_path);

    if write_default_config(&path)? {
        println!("  {} created config at {}", "✓".green(), path.display());
    } else {
        println!("  {} config already exists at {}", "✓".green(), path.display());
    }

    let history_dir = get_data_path().join("history");
    std::fs::create_dir_all(&history_dir)
        .with_context(|| format!("failed to create {}", history_dir.display()))?;

    println!();
    println!("  Next steps:");
    println!("    1. Set {} (Basic <base64 of client_id:secret>)", "gigachat.authorizationKey".bold());
    println!("    2. For Telegram, set {} and {}", "telegram.token".bold(), "telegram.username".bold());
    println!("    3. Run {} or {}", "gigabot chat".green(), "gigabot gateway".green());
    println!();

    Ok(())
}

/// Write the default config unless a file already exists. Returns whether
/// a file was written.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
