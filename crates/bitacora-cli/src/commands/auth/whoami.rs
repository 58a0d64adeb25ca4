//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Ask the server instead of reading the stored user
    #[arg(long)]
    pub remote: bool,

    /// Print the user record as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WhoamiArgs, api_url: &str) -> Result<()> {
    let client = session::logged_in_client(api_url)?;

    let user = if args.remote {
        client
            .fetch_current_user()
            .await
            .context("Failed to fetch current user")?
    } else {
        client
            .current_user()
            .context("No active session. Run 'bitacora auth login' first.")?
    };

    if args.json {
        return output::json_pretty(&user);
    }

    output::field("User", &user.username);
    output::field("Id", &user.id.to_string());
    output::field("Role", &user.role);
    if let Some(name) = &user.full_name {
        output::field("Name", name);
    }
    if let Some(email) = &user.email {
        output::field("Email", email);
    }

    Ok(())
}
