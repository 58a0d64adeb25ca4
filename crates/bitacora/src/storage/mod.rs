//! Persistent session storage.
//!
//! [`TokenStore`] is a typed view over a [`KeyValueStore`] backend. Two
//! backends ship with the crate: [`MemoryStore`] for tests and short-lived
//! processes, and [`FileStore`] for a session that survives restarts.

mod file;
mod memory;
mod token_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use token_store::TokenStore;

use thiserror::Error;

/// Key holding the access token.
pub const TOKEN_KEY: &str = "bitacora_token";
/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "bitacora_refresh_token";
/// Key holding the JSON-serialized [`UserRecord`](crate::UserRecord).
pub const USER_KEY: &str = "bitacora_user";
/// Key holding the access token expiry in epoch seconds.
pub const TOKEN_EXPIRATION_KEY: &str = "bitacora_token_expiration";

/// Every key the session occupies.
pub const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, TOKEN_EXPIRATION_KEY];

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying medium could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data is not valid JSON.
    #[error("corrupt storage: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The backend is unavailable.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

/// String key-value storage.
///
/// Writes must be durable when the call returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
