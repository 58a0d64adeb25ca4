//! Status command implementation.

use anyhow::Result;
use bitacora::TokenCodec;
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn run(_args: StatusArgs, api_url: &str) -> Result<()> {
    let client = session::client(api_url)?;
    let store = client.store();

    let Some(token) = store.get_token() else {
        println!("{}", "Not logged in".yellow());
        return Ok(());
    };

    if let Some(user) = store.get_user() {
        output::field("User", &format!("{} ({})", user.username, user.role));
    }

    match TokenCodec::expiration(token.as_str()).or_else(|| store.get_expiration()) {
        Some(exp) => {
            let state = if exp <= Utc::now().timestamp() {
                "expired".red()
            } else {
                "valid".green()
            };
            output::field("Token", &format!("{state}, expires {}", output::timestamp(exp)));
        }
        None => output::field("Token", "opaque, expiry unknown"),
    }

    let refresh = if store.get_refresh_token().is_some() {
        "present"
    } else {
        "none"
    };
    output::field("Refresh token", refresh);

    Ok(())
}
