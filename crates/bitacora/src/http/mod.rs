//! Authenticated HTTP pipeline.
//!
//! Requests flow through the [`RequestInterceptor`], which attaches the
//! stored bearer token, sends over a [`Transport`] and, on a 401, asks the
//! [`RefreshCoordinator`] for a new token before retrying once.

pub(crate) mod endpoints;
mod interceptor;
mod lifecycle;
mod refresh;
mod transport;

pub use interceptor::RequestInterceptor;
pub use lifecycle::{RequestState, Step};
pub use refresh::RefreshCoordinator;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

pub use reqwest::Method;
