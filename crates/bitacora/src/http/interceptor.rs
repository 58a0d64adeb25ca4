//! Bearer-token request interceptor.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, trace, warn};

use crate::Result;
use crate::auth::AccessToken;
use crate::codec::TokenCodec;
use crate::error::{AuthError, Error};
use crate::events::{AuthEvent, AuthEventBus};
use crate::storage::TokenStore;

use super::lifecycle::{RequestState, Step};
use super::refresh::RefreshCoordinator;
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Sends requests with the stored bearer token, refreshing once on 401.
///
/// A request that gets a 401 is retried exactly once, with the token from
/// the [`RefreshCoordinator`]. If the refresh fails, or the retry is also
/// rejected, the session is cleared, `SessionExpired` is published and the
/// original 401 is returned. Any other error is returned unchanged.
pub struct RequestInterceptor<T> {
    transport: Arc<T>,
    store: TokenStore,
    events: AuthEventBus,
    coordinator: RefreshCoordinator<T>,
    expiry_leeway_secs: i64,
}

impl<T> Clone for RequestInterceptor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            store: self.store.clone(),
            events: self.events.clone(),
            coordinator: self.coordinator.clone(),
            expiry_leeway_secs: self.expiry_leeway_secs,
        }
    }
}

impl<T: Transport + 'static> RequestInterceptor<T> {
    pub fn new(
        transport: Arc<T>,
        store: TokenStore,
        events: AuthEventBus,
        coordinator: RefreshCoordinator<T>,
        expiry_leeway_secs: i64,
    ) -> Self {
        Self {
            transport,
            store,
            events,
            coordinator,
            expiry_leeway_secs,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<T> {
        &self.coordinator
    }

    /// Send `request` through the auth pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for any non-2xx response, [`Error::Transport`]
    /// when no response arrives and [`AuthError::SessionExpired`] when an
    /// expired token could not be refreshed before sending.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut state = RequestState::Pending;

        if request.skip_auth {
            advance(&mut state, Step::Send);
            let response = self.send(&mut state, &request, None).await?;
            return finish(&mut state, response);
        }

        let token = match self.token_for_send().await {
            Ok(token) => token,
            Err(e) => {
                advance(&mut state, Step::Abort);
                return Err(e);
            }
        };

        advance(&mut state, Step::Send);
        let response = self.send(&mut state, &request, token.as_ref()).await?;
        if response.status != 401 {
            return finish(&mut state, response);
        }

        let original = response.to_error();
        advance(&mut state, Step::Response { status: 401 });
        advance(&mut state, Step::Refresh);

        let fresh = self.coordinator.refresh_after(token.as_ref()).await;

        advance(
            &mut state,
            Step::Refreshed {
                token: fresh.is_some(),
            },
        );
        let Some(fresh) = fresh else {
            warn!("token refresh failed, abandoning request");
            return Err(Error::Api(original));
        };

        let retry = self.send(&mut state, &request, Some(&fresh)).await?;
        if retry.status == 401 {
            advance(&mut state, Step::Response { status: 401 });
            warn!("retry rejected with a fresh token, abandoning session");
            self.expire_session("request rejected after token refresh");
            return Err(Error::Api(original));
        }

        finish(&mut state, retry)
    }

    /// Send once with `token`, without any refresh handling.
    pub async fn send_with(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<ApiResponse> {
        let mut state = RequestState::Pending;
        advance(&mut state, Step::Send);
        self.send(&mut state, request, token).await
    }

    /// The token to attach, refreshing first if it is known to be expired.
    async fn token_for_send(&self) -> Result<Option<AccessToken>> {
        let Some(token) = self.store.get_token() else {
            return Ok(None);
        };

        let expires_at =
            TokenCodec::expiration(token.as_str()).or_else(|| self.store.get_expiration());
        let expired = expires_at
            .is_some_and(|exp| exp <= Utc::now().timestamp() + self.expiry_leeway_secs);
        if !expired {
            return Ok(Some(token));
        }

        debug!(?expires_at, "stored token expired, refreshing before send");
        self.events.publish(AuthEvent::TokenExpired {
            expired_at: expires_at,
        });

        match self.coordinator.refresh_after(Some(&token)).await {
            Some(fresh) => Ok(Some(fresh)),
            None => Err(AuthError::SessionExpired.into()),
        }
    }

    async fn send(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<ApiResponse> {
        let outgoing = match token {
            Some(token) => request.with_bearer(token),
            None => Ok(request.clone()),
        };
        let outgoing = outgoing.inspect_err(|_| advance(state, Step::Abort))?;

        match self.transport.send(&outgoing).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(error = %e, "request failed before a response arrived");
                advance(state, Step::Abort);
                Err(e.into())
            }
        }
    }

    fn expire_session(&self, reason: &str) {
        if self.store.clear() {
            self.events.publish(AuthEvent::SessionExpired {
                reason: reason.to_string(),
            });
        }
    }
}

fn advance(state: &mut RequestState, step: Step) {
    match state.next(step) {
        Some(next) => {
            trace!(from = %state, to = %next, ?step, "request state");
            *state = next;
        }
        None => debug_assert!(false, "invalid request transition {state} on {step:?}"),
    }
}

fn finish(state: &mut RequestState, response: ApiResponse) -> Result<ApiResponse> {
    advance(state, Step::Response {
        status: response.status,
    });
    response.error_for_status()
}

impl<T> fmt::Debug for RequestInterceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("coordinator", &self.coordinator)
            .field("expiry_leeway_secs", &self.expiry_leeway_secs)
            .finish()
    }
}
