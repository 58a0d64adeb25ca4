//! Typed session storage.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::{AccessToken, RefreshToken, Session, UserRecord};

use super::{
    KeyValueStore, MemoryStore, REFRESH_TOKEN_KEY, SESSION_KEYS, StorageError, TOKEN_EXPIRATION_KEY,
    TOKEN_KEY, USER_KEY,
};

/// Typed access to the stored session.
///
/// Cheap to clone; clones share the backend. Backend failures never
/// reach the caller: they are logged at `warn` and reads degrade to
/// `None` while writes become no-ops.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A store over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn from_backend(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    // ========================================================================
    // Access token
    // ========================================================================

    pub fn get_token(&self) -> Option<AccessToken> {
        self.read(TOKEN_KEY).map(AccessToken::new)
    }

    pub fn set_token(&self, token: &AccessToken) {
        self.write(TOKEN_KEY, token.as_str());
    }

    pub fn remove_token(&self) {
        self.delete(TOKEN_KEY);
    }

    // ========================================================================
    // Refresh token
    // ========================================================================

    pub fn get_refresh_token(&self) -> Option<RefreshToken> {
        self.read(REFRESH_TOKEN_KEY).map(RefreshToken::new)
    }

    pub fn set_refresh_token(&self, token: &RefreshToken) {
        self.write(REFRESH_TOKEN_KEY, token.as_str());
    }

    pub fn remove_refresh_token(&self) {
        self.delete(REFRESH_TOKEN_KEY);
    }

    // ========================================================================
    // User record
    // ========================================================================

    /// The stored user; `None` if missing or not valid JSON.
    pub fn get_user(&self) -> Option<UserRecord> {
        let json = self.read(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "stored user record is not valid, ignoring it");
                None
            }
        }
    }

    pub fn set_user(&self, user: &UserRecord) {
        match serde_json::to_string(user) {
            Ok(json) => self.write(USER_KEY, &json),
            Err(e) => warn!(error = %e, "failed to serialize user record"),
        }
    }

    pub fn remove_user(&self) {
        self.delete(USER_KEY);
    }

    // ========================================================================
    // Expiration
    // ========================================================================

    /// Stored access token expiry in epoch seconds.
    pub fn get_expiration(&self) -> Option<i64> {
        self.read(TOKEN_EXPIRATION_KEY)?.trim().parse().ok()
    }

    pub fn set_expiration(&self, epoch_seconds: i64) {
        self.write(TOKEN_EXPIRATION_KEY, &epoch_seconds.to_string());
    }

    pub fn remove_expiration(&self) {
        self.delete(TOKEN_EXPIRATION_KEY);
    }

    // ========================================================================
    // Whole session
    // ========================================================================

    /// True iff both a token and a user are stored.
    pub fn is_authenticated(&self) -> bool {
        self.get_token().is_some() && self.get_user().is_some()
    }

    /// Replace the stored session.
    pub fn save_session(&self, session: &Session) {
        self.set_token(&session.access_token);
        match &session.refresh_token {
            Some(token) => self.set_refresh_token(token),
            None => self.remove_refresh_token(),
        }
        self.set_user(&session.user);
        match session.expiry_epoch_seconds {
            Some(exp) => self.set_expiration(exp),
            None => self.remove_expiration(),
        }
        debug!(user = %session.user.username, "session stored");
    }

    /// The stored session, if a token and a user are both present.
    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access_token: self.get_token()?,
            refresh_token: self.get_refresh_token(),
            user: self.get_user()?,
            expiry_epoch_seconds: self.get_expiration(),
        })
    }

    /// Remove every session key. Returns whether anything was stored.
    pub fn clear(&self) -> bool {
        let had_session = SESSION_KEYS.iter().any(|key| self.read(key).is_some());
        for key in SESSION_KEYS {
            self.delete(key);
        }
        if had_session {
            debug!("session cleared");
        }
        had_session
    }

    fn read(&self, key: &str) -> Option<String> {
        self.backend
            .get(key)
            .unwrap_or_else(|e| degraded(key, "read", e, None))
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            degraded(key, "write", e, ());
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            degraded(key, "remove", e, ());
        }
    }
}

fn degraded<T>(key: &str, op: &str, error: StorageError, fallback: T) -> T {
    warn!(key, op, error = %error, "session storage unavailable");
    fallback
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
