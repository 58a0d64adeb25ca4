//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ApiUrl;

/// Endpoint paths, relative to [`ClientConfig::base_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub current_user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
            current_user: "/auth/me".to_string(),
        }
    }
}

/// Settings for a [`Client`](crate::Client).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bitacora::{ApiUrl, ClientConfig};
///
/// let config = ClientConfig::new(ApiUrl::new("https://bitacora.example.com/api").unwrap())
///     .with_request_timeout(Duration::from_secs(10));
/// assert_eq!(config.endpoints.refresh, "/auth/refresh");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub base_url: ApiUrl,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "millis")]
    pub request_timeout: Duration,

    /// A token expiring within this many seconds is refreshed before sending.
    #[serde(default = "default_expiry_leeway")]
    pub expiry_leeway_secs: i64,

    /// Delay before an authentication failure redirects to login.
    #[serde(default = "default_redirect_delay", with = "millis")]
    pub redirect_delay: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_expiry_leeway() -> i64 {
    0
}

fn default_redirect_delay() -> Duration {
    Duration::from_millis(1500)
}

fn default_user_agent() -> String {
    concat!("bitacora/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            endpoints: Endpoints::default(),
            request_timeout: default_request_timeout(),
            expiry_leeway_secs: default_expiry_leeway(),
            redirect_delay: default_redirect_delay(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_expiry_leeway(mut self, secs: i64) -> Self {
        self.expiry_leeway_secs = secs;
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
