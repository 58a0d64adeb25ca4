//! Core value types.
//!
//! These types enforce their invariants at construction time,
//! ensuring invalid states are unrepresentable.

mod api_url;

pub use api_url::ApiUrl;
