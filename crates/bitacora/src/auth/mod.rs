//! Authentication types.
//!
//! This module holds the credentials, token and session records that the
//! request pipeline moves between the API and the [`TokenStore`](crate::TokenStore).

mod credentials;
mod session;
mod tokens;

pub use credentials::Credentials;
pub use session::{Session, UserRecord};
pub use tokens::{AccessToken, RefreshToken};
