//! Refresh token command implementation.

use anyhow::{Context, Result};
use bitacora::TokenCodec;
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RefreshTokenArgs {}

pub async fn run(_args: RefreshTokenArgs, api_url: &str) -> Result<()> {
    let client = session::logged_in_client(api_url)?;

    eprintln!("{}", "Refreshing session...".dimmed());

    let token = client
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    if let Some(exp) = TokenCodec::expiration(token.as_str()) {
        output::field("Expires", &output::timestamp(exp));
    }

    Ok(())
}
