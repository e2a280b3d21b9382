//! HTTP-facing pieces: errors, the session layer, and the credential
//! verification chain.

pub mod auth;
pub mod error;
pub mod session;

pub use error::AuthError;
