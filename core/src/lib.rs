//! Session and authentication core for the gatehouse code-review server.
//!
//! This crate turns an inbound request's credentials (session cookie, HTTP
//! Basic header, trusted-proxy header, OAuth bearer/cookie, run-as header)
//! into a bound identity for the rest of request processing, and manages the
//! lifecycle of the opaque session token that keeps a browser signed in
//! without re-presenting a password.
//!
//! # Example
//! ```rust,ignore
//! use gatehouse_core::http::auth::{SessionAuth, BasicAuthVerifier, BasicAuthConfig};
//! use gatehouse_core::http::session::{SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::in_memory(SessionStoreConfig::new());
//! let auth = SessionAuth::new(store, accounts)
//!     .verifier(BasicAuthVerifier::new(BasicAuthConfig::new(), accounts, encoder));
//!
//! App::new().wrap(auth)
//! ```

pub mod http;
