//! Session management: opaque tokens, the record store, the per-request
//! session view, and CSRF protection.
//!
//! # Features
//!
//! - Opaque, unforgeable session tokens ([`TokenCodec`])
//! - Pluggable TTL record storage with a bounded in-memory default
//!   ([`SessionStore`], [`SessionCache`])
//! - Per-request session state with sliding cookie refresh ([`WebSession`])
//! - Double-submit CSRF validation tied to the session ([`CsrfGuard`])

pub mod csrf;
pub mod store;
pub mod token;
pub mod web_session;

pub use csrf::CsrfGuard;
pub use store::{
    MemorySessionCache, SessionCache, SessionRecord, SessionStore, SessionStoreConfig,
};
pub use token::{SessionKey, TokenCodec};
pub use web_session::{AccessPath, CookieWrite, WebSession};
