//! Auth subcommand implementations.

mod decode_token;
mod login;
mod logout;
mod refresh_token;
mod status;
mod whoami;

use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Create a new session (login)
    Login(login::LoginArgs),

    /// Display the logged-in user
    Whoami(whoami::WhoamiArgs),

    /// Show the session and token expiry
    Status(status::StatusArgs),

    /// Refresh the access token
    RefreshToken(refresh_token::RefreshTokenArgs),

    /// End the session
    Logout(logout::LogoutArgs),

    /// Decode a token's claims without verifying it
    DecodeToken(decode_token::DecodeTokenArgs),
}

pub async fn handle(cmd: AuthCommand, api_url: &str) -> Result<()> {
    match cmd.command {
        AuthSubcommand::Login(args) => login::run(args, api_url).await,
        AuthSubcommand::Whoami(args) => whoami::run(args, api_url).await,
        AuthSubcommand::Status(args) => status::run(args, api_url),
        AuthSubcommand::RefreshToken(args) => refresh_token::run(args, api_url).await,
        AuthSubcommand::Logout(args) => logout::run(args, api_url).await,
        AuthSubcommand::DecodeToken(args) => decode_token::run(args, api_url),
    }
}
