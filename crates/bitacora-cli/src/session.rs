//! Session file location and client construction.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bitacora::{ApiUrl, Client, ClientConfig, FileStore, Notice, TokenStore};
use directories::ProjectDirs;
use tracing::debug;

use crate::output;

/// Get the session file path.
pub fn session_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "bitacora").context("Could not determine data directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("session.json"))
}

/// Build a client over the persisted session that prints auth notices.
pub fn client(api_url: &str) -> Result<Client> {
    let url = ApiUrl::new(api_url).context("Invalid API URL")?;
    let path = session_path()?;
    debug!(path = %path.display(), "Using session file");
    let store = TokenStore::new(FileStore::new(path));
    let config = ClientConfig::new(url);
    let redirect_delay = config.redirect_delay;

    let client = Client::new(config, store).context("Failed to create HTTP client")?;

    // Lives as long as the client; dropping the handle does not unsubscribe.
    let _notices = client.events().subscribe_all(move |event| {
        if let Some(notice) = Notice::for_event(event, redirect_delay) {
            output::notice(&notice);
        }
    });

    Ok(client)
}

/// Like [`client`], but fails when no session is stored.
pub fn logged_in_client(api_url: &str) -> Result<Client> {
    let client = client(api_url)?;
    if !client.is_authenticated() {
        anyhow::bail!("No active session. Run 'bitacora auth login' first.");
    }
    Ok(client)
}
