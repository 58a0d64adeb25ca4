//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::auth::AuthCommand;
use crate::commands::request::RequestArgs;

/// Command-line client for the Bitácora API.
#[derive(Parser, Debug)]
#[command(name = "bitacora")]
#[command(author, version = env!("BITACORA_VERSION"), about, long_about = None)]
pub struct Cli {
    /// API base URL
    #[arg(
        long,
        env = "BITACORA_API_URL",
        default_value = "http://localhost:8080/api",
        global = true
    )]
    pub api_url: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session management
    Auth(AuthCommand),

    /// Send an authenticated request
    Request(RequestArgs),
}
