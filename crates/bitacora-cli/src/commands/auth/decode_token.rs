//! Decode token command implementation.

use anyhow::{Context, Result};
use bitacora::TokenCodec;
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct DecodeTokenArgs {
    /// Token to decode (defaults to the stored access token)
    #[arg(long)]
    pub token: Option<String>,
}

/// Claims are printed as-is. The signature is not checked, so nothing here
/// should be trusted for access decisions.
pub fn run(args: DecodeTokenArgs, api_url: &str) -> Result<()> {
    let token = match args.token {
        Some(token) => token,
        None => session::client(api_url)?
            .store()
            .get_token()
            .context("No token given and no active session")?
            .as_str()
            .to_string(),
    };

    let claims = TokenCodec::decode(&token).context("Token is not a decodable JWT")?;
    output::json_pretty(&claims)?;

    if TokenCodec::is_expired(&token) {
        eprintln!("token is expired");
    }

    Ok(())
}
