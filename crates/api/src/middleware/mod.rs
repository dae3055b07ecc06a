//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Resolves the bearer token's subject to an owner account.

pub mod auth;
