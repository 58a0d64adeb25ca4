//! User-visible notices for errors and auth events.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, ErrorKind};
use crate::events::AuthEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message to show the user, optionally followed by a redirect to login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Send the user back to login after this delay.
    pub redirect_after: Option<Duration>,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            redirect_after: None,
        }
    }

    fn redirecting(mut self, delay: Duration) -> Self {
        self.redirect_after = Some(delay);
        self
    }

    /// The notice for a failed request.
    ///
    /// Only authentication failures redirect to login.
    pub fn for_error(error: &Error, redirect_delay: Duration) -> Self {
        let server_message = match error {
            Error::Api(api) => api.message.clone(),
            _ => None,
        };

        match error.kind() {
            ErrorKind::Authentication => Notice::new(
                NoticeLevel::Warning,
                "Your session has expired. Please log in again.",
            )
            .redirecting(redirect_delay),
            ErrorKind::Authorization => Notice::new(
                NoticeLevel::Error,
                "You do not have permission to perform this action.",
            ),
            ErrorKind::Validation => Notice::new(
                NoticeLevel::Error,
                server_message.unwrap_or_else(|| "The request was invalid.".to_string()),
            ),
            ErrorKind::Network => Notice::new(
                NoticeLevel::Error,
                "Could not reach the server. Check your connection.",
            ),
            ErrorKind::Server => Notice::new(
                NoticeLevel::Error,
                "The server encountered an error. Please try again later.",
            ),
            ErrorKind::Unknown => Notice::new(
                NoticeLevel::Error,
                server_message.unwrap_or_else(|| error.to_string()),
            ),
        }
    }

    /// The notice for an auth event, if the user should see one.
    pub fn for_event(event: &AuthEvent, redirect_delay: Duration) -> Option<Self> {
        let notice = match event {
            AuthEvent::Login { user } => {
                Notice::new(NoticeLevel::Success, format!("Welcome, {}.", user.username))
            }
            AuthEvent::Logout { .. } => Notice::new(NoticeLevel::Info, "You have been logged out."),
            AuthEvent::SessionExpired { .. } => Notice::new(
                NoticeLevel::Warning,
                "Your session has expired. Please log in again.",
            )
            .redirecting(redirect_delay),
            AuthEvent::AuthError { message, .. } => Notice::new(NoticeLevel::Error, message.clone()),
            AuthEvent::TokenExpired { .. } | AuthEvent::TokenRefreshed { .. } => return None,
        };
        Some(notice)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
