//! Shared CLI helpers: path expansion, reply printing, banner.

use std::path::PathBuf;

use colored::Colorize;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let Some(home) = dirs_next::home_dir() else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home;
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Print a relayed reply to stdout.
pub fn print_response(reply: &str) {
    println!();
    println!("{}", "GigaChat".cyan().bold());
    println!("{reply}");
    println!();
}

/// Print the banner shown when the console starts.
pub fn print_banner(model: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Gigabot".cyan().bold(), version.dimmed());
    println!("{}", format!("Model: {model}").dimmed());
    println!("{}", "Type a message, or \"exit\" to quit.".dimmed());
    println!();
}

pub fn print_thinking() {
    eprint!("{}", "waiting for GigaChat...".dimmed());
}

pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
