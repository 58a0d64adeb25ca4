//! Error types for the bitacora library.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, API and input validation errors, plus the
//! [`ErrorKind`] taxonomy used to decide how a failure is reported.

use std::fmt;
use thiserror::Error;

/// The unified error type for bitacora operations.
///
/// This error type covers all possible failure modes in the library,
/// with explicit variants to allow callers to handle specific cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (no response received).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors raised locally (no session, session expired).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success responses returned by the API.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Input validation errors (bad base URL, bad request body).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Classify this error into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(TransportError::Decode { .. }) => ErrorKind::Unknown,
            Error::Transport(_) => ErrorKind::Network,
            Error::Auth(_) => ErrorKind::Authentication,
            Error::Api(err) => err.kind(),
            Error::InvalidInput(_) => ErrorKind::Validation,
        }
    }

    /// Returns the HTTP status if this error came from an API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

/// User-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// 401, expired or invalid credentials.
    Authentication,
    /// 403.
    Authorization,
    /// 400 or 422.
    Validation,
    /// 5xx.
    Server,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status code to its kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            400 | 422 => ErrorKind::Validation,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Validation => "validation",
            ErrorKind::Server => "server",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// A response body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::Decode {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication errors raised by the client itself.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session is stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Session has expired and could not be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// No refresh token is available.
    #[error("refresh token missing")]
    RefreshTokenMissing,
}

/// A non-success response from the API.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Classify by status.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_status(self.status)
    }

    /// Only a 401 invalidates the token.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Request body could not be serialized.
    #[error("invalid request body: {message}")]
    Body { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
