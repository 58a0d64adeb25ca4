//! Output formatting helpers.

use anyhow::Result;
use bitacora::{Notice, NoticeLevel};
use colored::Colorize;
use serde::Serialize;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a notice on stderr.
pub fn notice(notice: &Notice) {
    let marker = match notice.level {
        NoticeLevel::Info => "i".blue(),
        NoticeLevel::Success => "✓".green(),
        NoticeLevel::Warning => "!".yellow(),
        NoticeLevel::Error => "✗".red(),
    };
    eprintln!("{} {}", marker, notice.message);

    // No pages to redirect to; point at the login command instead.
    if notice.redirect_after.is_some() {
        eprintln!("  {}", "Run 'bitacora auth login' to sign in again.".dimmed());
    }
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Format an epoch timestamp for display.
pub fn timestamp(epoch_seconds: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch_seconds, 0) {
        Some(at) => at.to_rfc3339(),
        None => epoch_seconds.to_string(),
    }
}
