//! Login command implementation.

use anyhow::{Context, Result};
use bitacora::Credentials;
use clap::Args;
use colored::Colorize;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username to authenticate with
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "BITACORA_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: LoginArgs, api_url: &str) -> Result<()> {
    let client = session::client(api_url)?;
    let credentials = Credentials::new(&args.username, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let user = client.login(credentials).await.context("Failed to login")?;

    println!();
    output::field("User", &user.username);
    output::field("Role", &user.role);
    if !user.permissions.is_empty() {
        let permissions: Vec<&str> = user.permissions.iter().map(String::as_str).collect();
        output::field("Permissions", &permissions.join(", "));
    }
    output::field("API", client.config().base_url.as_str());

    Ok(())
}
