//! Credential verification: pluggable strategies, the ordered chain, the
//! middleware that drives them, and the collaborator traits for account
//! lookup and delegated verification.
//!
//! # Features
//!
//! - Ordered, explicit strategy chain ([`VerifierChain`])
//! - HTTP Basic with local, delegated, or mixed password policies
//! - Trusted reverse-proxy header assertion (fail-closed)
//! - OAuth bearer tokens for git-over-http
//! - Capability-gated per-request impersonation
//! - Request-scoped audit trail flushed to configured sinks

pub mod accounts;
pub mod audit;
pub mod basic;
pub mod crypto;
pub mod extractor;
pub mod impersonate;
pub mod middleware;
pub mod oauth;
pub mod paths;
pub mod trusted_header;
pub mod verifier;

pub use accounts::{
    AccountError, AccountId, AccountInfo, AccountService, BackendError, CapabilityChecker,
    CredentialBackend, MemoryAccountService, MemoryCapabilityChecker, MemoryCredentialBackend,
    OAuthTokenVerifier,
};
pub use audit::{AuditLog, AuditSink, AuthEvent, AuthEventType, MemorySink, StdoutSink};
pub use basic::{BasicAuthConfig, BasicAuthPolicy, BasicAuthVerifier};
#[cfg(feature = "argon2")]
pub use crypto::Argon2PasswordEncoder;
pub use crypto::{NoOpPasswordEncoder, PasswordEncoder};
pub use extractor::{CurrentAccount, SessionHandle};
pub use impersonate::{ImpersonationConfig, ImpersonationVerifier};
pub use middleware::{CookieConfig, SessionAuth, SessionAuthMiddleware};
pub use oauth::{OAuthConfig, OAuthProviderRegistry, OAuthVerifier};
pub use paths::PathClassifier;
pub use trusted_header::{TrustedHeaderConfig, TrustedHeaderVerifier};
pub use verifier::{CredentialVerifier, Denial, Outcome, VerifierChain};
