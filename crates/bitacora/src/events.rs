//! Auth lifecycle events.
//!
//! The [`AuthEventBus`] is a synchronous, in-process publish/subscribe
//! channel. Handlers for an event kind run in the order they subscribed,
//! inside the call to [`AuthEventBus::publish`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, trace};

use crate::auth::UserRecord;
use crate::error::ErrorKind;

/// An auth lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A login succeeded and the session was stored.
    Login { user: UserRecord },
    /// The session was cleared on request.
    Logout { username: Option<String> },
    /// A stored token was found past its expiry before sending.
    TokenExpired { expired_at: Option<i64> },
    /// The refresh endpoint issued a new access token.
    TokenRefreshed { expires_at: Option<i64> },
    /// The session could not be recovered and was cleared.
    SessionExpired { reason: String },
    /// An authentication step failed.
    AuthError { kind: ErrorKind, message: String },
}

impl AuthEvent {
    pub fn kind(&self) -> AuthEventKind {
        match self {
            AuthEvent::Login { .. } => AuthEventKind::Login,
            AuthEvent::Logout { .. } => AuthEventKind::Logout,
            AuthEvent::TokenExpired { .. } => AuthEventKind::TokenExpired,
            AuthEvent::TokenRefreshed { .. } => AuthEventKind::TokenRefreshed,
            AuthEvent::SessionExpired { .. } => AuthEventKind::SessionExpired,
            AuthEvent::AuthError { .. } => AuthEventKind::AuthError,
        }
    }
}

/// Payload-free discriminant of [`AuthEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthEventKind {
    Login,
    Logout,
    TokenExpired,
    TokenRefreshed,
    SessionExpired,
    AuthError,
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthEventKind::Login => "login",
            AuthEventKind::Logout => "logout",
            AuthEventKind::TokenExpired => "token_expired",
            AuthEventKind::TokenRefreshed => "token_refreshed",
            AuthEventKind::SessionExpired => "session_expired",
            AuthEventKind::AuthError => "auth_error",
        };
        f.write_str(name)
    }
}

type Handler = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

struct Registration {
    /// `None` receives every kind.
    kind: Option<AuthEventKind>,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    // Ids only grow, so iteration order is subscription order.
    handlers: BTreeMap<u64, Registration>,
}

/// Publish/subscribe channel for [`AuthEvent`]s.
///
/// Cheap to clone; clones share the same subscribers. Create one at
/// bootstrap and pass it to whatever needs to publish or listen.
#[derive(Clone, Default)]
pub struct AuthEventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: AuthEventKind, handler: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    /// Register `handler` for every event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    fn register(&self, kind: Option<AuthEventKind>, handler: Handler) -> Subscription {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.insert(id, Registration { kind, handler });
        trace!(id, ?kind, "auth event handler subscribed");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver `event` to its subscribers, synchronously and in order.
    pub fn publish(&self, event: AuthEvent) {
        let kind = event.kind();
        // Snapshot so handlers can (un)subscribe without deadlocking.
        let handlers: Vec<Handler> = {
            let inner = lock(&self.inner);
            inner
                .handlers
                .values()
                .filter(|r| r.kind.is_none_or(|k| k == kind))
                .map(|r| Arc::clone(&r.handler))
                .collect()
        };

        debug!(%kind, subscribers = handlers.len(), "publishing auth event");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }
}

impl fmt::Debug for AuthEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`AuthEventBus::subscribe`].
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe)
/// on teardown.
#[derive(Debug, Clone)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    bus: Weak<Mutex<BusInner>>,
    id: u64,
}

impl Subscription {
    /// Remove the handler. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade()
            && lock(&bus).handlers.remove(&self.id).is_some()
        {
            trace!(id = self.id, "auth event handler unsubscribed");
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> std::sync::MutexGuard<'_, BusInner> {
    // Handlers never run under the lock, so the map survives a poison.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
