//! bitacora - Session and token client for the Bitácora API
//!
//! This library owns the client side of a Bitácora login: it stores the
//! session, attaches bearer tokens to requests, refreshes expired tokens
//! exactly once no matter how many requests notice at the same time, and
//! broadcasts auth lifecycle events. All API calls flow through a
//! [`Client`].
//!
//! # Example
//!
//! ```no_run
//! use bitacora::{ApiUrl, AuthEventKind, Client, ClientConfig, Credentials, TokenStore};
//!
//! # async fn example() -> Result<(), bitacora::Error> {
//! let config = ClientConfig::new(ApiUrl::new("https://bitacora.example.com/api")?);
//! let client = Client::new(config, TokenStore::in_memory())?;
//!
//! let _sub = client.events().subscribe(AuthEventKind::SessionExpired, |event| {
//!     eprintln!("{event:?}");
//! });
//!
//! let user = client.login(Credentials::new("alice", "secret")).await?;
//! println!("logged in as {} ({})", user.username, user.role);
//!
//! let activities: serde_json::Value = client.get("/activities").await?;
//! println!("{activities}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod notice;
pub mod storage;
pub mod types;

// Re-export primary types at crate root for convenience
pub use auth::{AccessToken, Credentials, RefreshToken, Session, UserRecord};
pub use client::Client;
pub use codec::{Claims, TokenCodec};
pub use config::{ClientConfig, Endpoints};
pub use error::{Error, ErrorKind};
pub use events::{AuthEvent, AuthEventBus, AuthEventKind, Subscription};
pub use notice::{Notice, NoticeLevel};
pub use storage::{FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
