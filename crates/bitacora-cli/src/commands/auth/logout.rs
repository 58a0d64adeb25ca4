//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, api_url: &str) -> Result<()> {
    let client = session::client(api_url)?;
    client.logout().await;
    Ok(())
}
