//! `gigabot status`: show configuration status.
//!
//! Secrets are only reported as set or missing.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use gigabot_core::config::{get_config_path, load_config};

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(get_config_path);
    let config = load_config(Some(path.as_path()));
    let gc = &config.gigachat;
    let tg = &config.telegram;

    println!();
    println!("{}", "Gigabot Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    println!();
    println!("  {}", "GigaChat:".bold());
    println!("    {:<18} {}", "OAuth URL", gc.oauth_url);
    println!("    {:<18} {}", "Chat URL", gc.chat_url);
    println!("    {:<18} {}", "Scope", gc.scope);
    println!("    {:<18} {}", "Model", gc.model);
    println!("    {:<18} {}s", "Timeout", gc.request_timeout().as_secs());
    println!(
        "    {:<18} {}",
        "Token refresh",
        if gc.proactive_refresh {
            "proactive"
        } else {
            "on rejection"
        }
    );
    println!("    {:<18} {}", "Authorization key", set_or_missing(gc.is_configured()));
    if let Err(e) = gc.validate() {
        println!("    {} {}", "⚠".yellow(), e);
    }

    println!();
    println!("  {}", "Telegram:".bold());
    if !cfg!(feature = "telegram") {
        println!("    {}", "· not compiled in (build with --features telegram)".dimmed());
    }
    if !tg.username.is_empty() {
        println!("    {:<18} @{}", "Username", tg.username);
    }
    println!("    {:<18} {}", "Bot token", set_or_missing(tg.is_configured()));
    println!(
        "    {:<18} {}",
        "Allowed users",
        if tg.allowed_users.is_empty() {
            "everyone".to_string()
        } else {
            tg.allowed_users.len().to_string()
        }
    );

    println!();
    Ok(())
}

fn set_or_missing(set: bool) -> String {
    if set {
        format!("{} (set)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    }
}
