//! Per-request lifecycle.

use std::fmt;

/// Where a single intercepted request is in its lifecycle.
///
/// ```text
/// PENDING -> SENT -> SUCCESS
///                 -> UNAUTHORIZED -> REFRESHING -> RETRIED -> SUCCESS | FAILED
///                                               -> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Sent,
    Unauthorized,
    Refreshing,
    Retried,
    Success,
    Failed,
}

/// Input that moves a [`RequestState`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The request went out on the transport.
    Send,
    /// A response arrived.
    Response { status: u16 },
    /// A token refresh started.
    Refresh,
    /// The refresh finished, yielding a token or not.
    Refreshed { token: bool },
    /// No response will come (transport error, local failure).
    Abort,
}

impl RequestState {
    /// The state after `step`, or `None` if `step` is not allowed here.
    pub fn next(self, step: Step) -> Option<RequestState> {
        use RequestState::*;

        let next = match (self, step) {
            (Pending, Step::Send) => Sent,
            (Sent, Step::Response { status: 401 }) => Unauthorized,
            (Sent | Retried, Step::Response { status }) if (200..300).contains(&status) => Success,
            (Sent | Retried, Step::Response { .. }) => Failed,
            (Unauthorized, Step::Refresh) => Refreshing,
            (Refreshing, Step::Refreshed { token: true }) => Retried,
            (Refreshing, Step::Refreshed { token: false }) => Failed,
            (state, Step::Abort) if !state.is_terminal() => Failed,
            _ => return None,
        };
        Some(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Success | RequestState::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Pending => "PENDING",
            RequestState::Sent => "SENT",
            RequestState::Unauthorized => "UNAUTHORIZED",
            RequestState::Refreshing => "REFRESHING",
            RequestState::Retried => "RETRIED",
            RequestState::Success => "SUCCESS",
            RequestState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
