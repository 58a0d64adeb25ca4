//! The client facade created at startup.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::auth::{AccessToken, Credentials, RefreshToken, Session, UserRecord};
use crate::codec::TokenCodec;
use crate::config::ClientConfig;
use crate::error::{AuthError, Error};
use crate::events::{AuthEvent, AuthEventBus};
use crate::http::endpoints::{LoginRequest, LoginResponse};
use crate::http::{
    ApiRequest, ApiResponse, RefreshCoordinator, ReqwestTransport, RequestInterceptor, Transport,
};
use crate::notice::Notice;
use crate::storage::TokenStore;

/// A Bitácora API client.
///
/// Owns the session store, the event bus and the request pipeline. Cloning
/// is cheap and every clone shares the same session and refresh state.
pub struct Client<T = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T> {
    config: ClientConfig,
    store: TokenStore,
    events: AuthEventBus,
    interceptor: RequestInterceptor<T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client<ReqwestTransport> {
    /// Create a client over HTTP with a fresh event bus.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: TokenStore) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(
            config,
            store,
            AuthEventBus::new(),
            transport,
        ))
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Create a client over any [`Transport`].
    pub fn with_transport(
        config: ClientConfig,
        store: TokenStore,
        events: AuthEventBus,
        transport: T,
    ) -> Self {
        let transport = Arc::new(transport);
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            store.clone(),
            events.clone(),
            config.endpoints.refresh.clone(),
        );
        let interceptor = RequestInterceptor::new(
            transport,
            store.clone(),
            events.clone(),
            coordinator,
            config.expiry_leeway_secs,
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                store,
                events,
                interceptor,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn events(&self) -> &AuthEventBus {
        &self.inner.events
    }

    pub fn interceptor(&self) -> &RequestInterceptor<T> {
        &self.inner.interceptor
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Log in and store the new session.
    ///
    /// Publishes `Login` on success and `AuthError` on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] with status 401 for bad credentials, or any
    /// transport error.
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: Credentials) -> Result<UserRecord> {
        info!("Logging in");

        let body = match self.request_login(&credentials).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "login failed");
                self.inner.events.publish(AuthEvent::AuthError {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let mut user = UserRecord::new(
            body.user_id,
            body.username
                .unwrap_or_else(|| credentials.username().to_string()),
            body.role,
        )
        .with_permissions(body.permissions);
        user.email = body.email;
        user.full_name = body.full_name;

        let expiry_epoch_seconds = TokenCodec::expiration(&body.token)
            .or_else(|| body.expires_in.map(|secs| Utc::now().timestamp() + secs));

        self.inner.store.save_session(&Session {
            access_token: AccessToken::new(body.token),
            refresh_token: body.refresh_token.map(RefreshToken::new),
            user: user.clone(),
            expiry_epoch_seconds,
        });

        info!(role = %user.role, "Login successful");
        self.inner
            .events
            .publish(AuthEvent::Login { user: user.clone() });
        Ok(user)
    }

    async fn request_login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let request = ApiRequest::post(&self.inner.config.endpoints.login)
            .json(&LoginRequest {
                username: credentials.username(),
                password: credentials.password(),
            })?
            .without_auth();
        self.inner.interceptor.execute(request).await?.json()
    }

    /// Clear the session and publish `Logout`.
    ///
    /// The server is told first, best-effort: a failed logout call is
    /// logged and the local session is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let username = self.inner.store.get_user().map(|user| user.username);

        if let Some(token) = self.inner.store.get_token() {
            let request = ApiRequest::post(&self.inner.config.endpoints.logout);
            match self.inner.interceptor.send_with(&request, Some(&token)).await {
                Ok(response) if !response.is_success() => {
                    debug!(status = response.status, "server rejected logout")
                }
                Ok(_) => debug!("server session ended"),
                Err(e) => debug!(error = %e, "logout request failed"),
            }
        }

        self.inner.store.clear();
        info!("Logged out");
        self.inner.events.publish(AuthEvent::Logout { username });
    }

    /// The stored user, without a network call.
    pub fn current_user(&self) -> Option<UserRecord> {
        self.inner.store.get_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// Fetch the current user from the server and update the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] if there is no session.
    #[instrument(skip(self))]
    pub async fn fetch_current_user(&self) -> Result<UserRecord> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated.into());
        }

        let user: UserRecord = self.get(&self.inner.config.endpoints.current_user).await?;
        self.inner.store.set_user(&user);
        Ok(user)
    }

    /// Refresh the access token now, joining any refresh in flight.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] without a session and
    /// [`AuthError::SessionExpired`] if the refresh fails (the session is
    /// cleared in that case).
    pub async fn refresh(&self) -> Result<AccessToken> {
        if self.inner.store.get_token().is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        if self.inner.store.get_refresh_token().is_none() {
            return Err(AuthError::RefreshTokenMissing.into());
        }

        self.inner
            .interceptor
            .coordinator()
            .refresh()
            .await
            .ok_or_else(|| AuthError::SessionExpired.into())
    }

    /// Whether a usable session exists, refreshing it if it has expired.
    pub async fn validate_session(&self) -> bool {
        let Some(token) = self.inner.store.get_token() else {
            return false;
        };

        let expires_at =
            TokenCodec::expiration(token.as_str()).or_else(|| self.inner.store.get_expiration());
        let expired = expires_at.is_some_and(|exp| {
            exp <= Utc::now().timestamp() + self.inner.config.expiry_leeway_secs
        });
        if !expired {
            return self.is_authenticated();
        }

        debug!(?expires_at, "session token expired, refreshing");
        self.refresh().await.is_ok()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request through the auth pipeline.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.inner.interceptor.execute(request).await
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        decode(self.execute(ApiRequest::get(path)).await?)
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        decode(self.execute(ApiRequest::post(path).json(body)?).await?)
    }

    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        decode(self.execute(ApiRequest::put(path).json(body)?).await?)
    }

    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        decode(self.execute(ApiRequest::patch(path).json(body)?).await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// The notice to show for a failed call, using the configured redirect delay.
    pub fn notice_for(&self, error: &Error) -> Notice {
        Notice::for_error(error, self.inner.config.redirect_delay)
    }
}

/// Empty bodies (204) decode as JSON `null`.
fn decode<R: DeserializeOwned>(response: ApiResponse) -> Result<R> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    response.json()
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url)
            .field("store", &self.inner.store)
            .finish()
    }
}
