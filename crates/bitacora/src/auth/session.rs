//! Session and user records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::tokens::{AccessToken, RefreshToken};

/// The authenticated user, as returned by the API at login.
///
/// Stored as camelCase JSON under `bitacora_user`. Fields the client does
/// not model are kept in `extra` so a stored record round-trips intact.
///
/// The permission helpers are for display only. The server re-validates
/// authorization on every request; never gate access control on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    pub fn new(id: i64, username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            role: role.into(),
            permissions: BTreeSet::new(),
            email: None,
            full_name: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Add permissions (builder style).
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Display-only permission check.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Display-only role check, case-insensitive.
    pub fn has_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }
}

/// A complete authenticated session.
///
/// Owned by the [`TokenStore`](crate::TokenStore); created at login,
/// replaced on refresh and destroyed on logout.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub user: UserRecord,
    /// Access token expiry, in Unix epoch seconds, when known.
    pub expiry_epoch_seconds: Option<i64>,
}
