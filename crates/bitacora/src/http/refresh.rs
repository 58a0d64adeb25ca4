//! Single-flight token refresh.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument, warn};

use crate::auth::{AccessToken, RefreshToken};
use crate::codec::TokenCodec;
use crate::error::ErrorKind;
use crate::events::{AuthEvent, AuthEventBus};
use crate::storage::TokenStore;

use super::endpoints::{RefreshRequest, RefreshResponse};
use super::transport::{ApiRequest, Transport};

type SharedRefresh = Shared<BoxFuture<'static, Option<AccessToken>>>;

/// Coalesces concurrent token refreshes into one network call.
///
/// While a refresh is in flight every caller of [`refresh`](Self::refresh)
/// awaits the same result. The slot is cleared once the call completes,
/// so the next expiry starts a fresh refresh.
pub struct RefreshCoordinator<T> {
    inner: Arc<RefreshInner<T>>,
}

struct RefreshInner<T> {
    transport: Arc<T>,
    store: TokenStore,
    events: AuthEventBus,
    refresh_path: String,
    flight: Mutex<Flight>,
}

#[derive(Default)]
struct Flight {
    generation: u64,
    pending: Option<(u64, SharedRefresh)>,
}

impl<T> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> RefreshCoordinator<T> {
    pub fn new(
        transport: Arc<T>,
        store: TokenStore,
        events: AuthEventBus,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                transport,
                store,
                events,
                refresh_path: refresh_path.into(),
                flight: Mutex::new(Flight::default()),
            }),
        }
    }

    /// Obtain a new access token, joining a refresh already in flight.
    ///
    /// On success the token store is updated and `TokenRefreshed` is
    /// published. On failure the session is cleared, `AuthError` and
    /// `SessionExpired` are published, and `None` is returned.
    pub async fn refresh(&self) -> Option<AccessToken> {
        let pending = {
            let mut flight = lock(&self.inner.flight);
            self.join_or_start(&mut flight)
        };
        pending.await
    }

    /// Like [`refresh`](Self::refresh), for a caller whose request was
    /// rejected while carrying `sent`.
    ///
    /// If no refresh is in flight and the store already holds a different
    /// token, that token is returned without a network call. The check is
    /// made under the same lock that starts a refresh, and a finished
    /// refresh stores its token before releasing the slot, so a caller can
    /// never start a second refresh for a token that was already replaced.
    pub async fn refresh_after(&self, sent: Option<&AccessToken>) -> Option<AccessToken> {
        let pending = {
            let mut flight = lock(&self.inner.flight);
            if flight.pending.is_none() {
                if let Some(current) = self.inner.store.get_token() {
                    if Some(&current) != sent {
                        debug!("token replaced since it was sent, reusing it");
                        return Some(current);
                    }
                }
            }
            self.join_or_start(&mut flight)
        };
        pending.await
    }

    fn join_or_start(&self, flight: &mut Flight) -> SharedRefresh {
        if let Some((_, pending)) = flight.pending.as_ref() {
            debug!("joining in-flight token refresh");
            return pending.clone();
        }

        flight.generation += 1;
        let generation = flight.generation;
        let inner = Arc::clone(&self.inner);
        let pending = async move {
            let token = inner.perform().await;
            inner.complete(generation);
            token
        }
        .boxed()
        .shared();
        flight.pending = Some((generation, pending.clone()));
        pending
    }

    /// Whether a refresh is currently in flight.
    pub fn in_flight(&self) -> bool {
        lock(&self.inner.flight).pending.is_some()
    }
}

impl<T: Transport> RefreshInner<T> {
    #[instrument(skip(self), fields(path = %self.refresh_path))]
    async fn perform(&self) -> Option<AccessToken> {
        let Some(refresh_token) = self.store.get_refresh_token() else {
            warn!("no refresh token stored");
            self.fail(ErrorKind::Authentication, "no refresh token available");
            return None;
        };

        info!("Refreshing access token");

        let request = match ApiRequest::post(&self.refresh_path).json(&RefreshRequest {
            refresh_token: refresh_token.as_str(),
        }) {
            Ok(request) => request.without_auth(),
            Err(e) => {
                self.fail(e.kind(), &e.to_string());
                return None;
            }
        };

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token refresh request failed");
                self.fail(ErrorKind::Network, &e.to_string());
                return None;
            }
        };

        if !response.is_success() {
            let error = response.to_error();
            warn!(status = error.status, "token refresh rejected");
            self.fail(error.kind(), &error.to_string());
            return None;
        }

        let body: RefreshResponse = match response.json() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "token refresh response is malformed");
                self.fail(e.kind(), &e.to_string());
                return None;
            }
        };

        let token = AccessToken::new(body.token);
        self.store.set_token(&token);
        if let Some(rotated) = body.refresh_token {
            self.store.set_refresh_token(&RefreshToken::new(rotated));
        }

        let expires_at = TokenCodec::expiration(token.as_str())
            .or_else(|| body.expires_in.map(|secs| Utc::now().timestamp() + secs));
        match expires_at {
            Some(exp) => self.store.set_expiration(exp),
            None => self.store.remove_expiration(),
        }

        debug!(?expires_at, "Access token refreshed");
        self.events.publish(AuthEvent::TokenRefreshed { expires_at });
        Some(token)
    }

    fn fail(&self, kind: ErrorKind, message: &str) {
        // Nothing to expire if the session is already gone.
        if !self.store.clear() {
            return;
        }

        self.events.publish(AuthEvent::AuthError {
            kind,
            message: message.to_string(),
        });
        self.events.publish(AuthEvent::SessionExpired {
            reason: format!("token refresh failed: {message}"),
        });
    }

    fn complete(&self, generation: u64) {
        let mut flight = lock(&self.flight);
        if flight
            .pending
            .as_ref()
            .is_some_and(|(pending, _)| *pending == generation)
        {
            flight.pending = None;
        }
    }
}

fn lock(flight: &Mutex<Flight>) -> MutexGuard<'_, Flight> {
    flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> fmt::Debug for RefreshCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.inner.refresh_path)
            .finish()
    }
}
