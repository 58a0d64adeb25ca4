//! Base URL of the Bitácora API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// Where the API lives: scheme, host, port and an optional base path.
///
/// Plain HTTP is only accepted for loopback hosts. Query strings and
/// fragments in the configured value are discarded, since every request
/// supplies its own. Endpoint paths are appended to the base path rather
/// than resolved against it, so `/auth/login` under
/// `https://example.com/v2/api` stays below `/v2/api`.
///
/// ```
/// use bitacora::ApiUrl;
///
/// let api = ApiUrl::new("https://bitacora.example.com/v2/api/?debug=1").unwrap();
/// assert_eq!(api.as_str(), "https://bitacora.example.com/v2/api");
/// assert_eq!(api.endpoint("activities"),
///            "https://bitacora.example.com/v2/api/activities");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

const LOOPBACK: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

impl ApiUrl {
    /// Parse and normalize an API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError::ApiUrl`] for unparsable input, a URL
    /// without a host, or HTTP to a non-loopback host.
    pub fn new(value: impl AsRef<str>) -> Result<Self, Error> {
        let value = value.as_ref();
        let reject = |reason: &str| -> Error {
            InvalidInputError::ApiUrl {
                value: value.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let mut url = Url::parse(value).map_err(|e| reject(&e.to_string()))?;
        let Some(host) = url.host_str() else {
            return Err(reject("must have a host"));
        };
        match url.scheme() {
            "https" => {}
            "http" if LOOPBACK.contains(&host) => {}
            "http" => return Err(reject("plain HTTP is only allowed for localhost")),
            other => return Err(reject(&format!("unsupported scheme '{other}'"))),
        }

        url.set_query(None);
        url.set_fragment(None);
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&base_path);

        Ok(Self(url))
    }

    /// Absolute URL for `path`, with or without its leading slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
