//! Credential verification strategies and the ordered chain that runs them.
//!
//! Each strategy inspects the request for its own credential shape. Absence
//! of that shape is not a failure; the strategy reports [`Outcome::Skipped`]
//! and the chain moves on. A credential that is present but bad stops the
//! chain with a [`Denial`] carrying the exact status to return.
//!
//! The chain order is explicit configuration, not registration order inside
//! a registry. Strategies that rebind an already-authenticated request
//! (impersonation) belong at the end; the chain keeps running after a
//! success for exactly that reason.

use std::sync::Arc;

use actix_web::dev::ServiceRequest;

use crate::http::error::AuthError;
use crate::http::session::{AccessPath, WebSession};

/// Result of one strategy looking at one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The strategy's credential shape was not present.
    Skipped,
    /// The strategy bound an identity onto the session.
    Authenticated,
}

/// A terminal verification failure.
///
/// The client-visible parts are the status and an optional
/// `WWW-Authenticate` challenge; `detail` is for the audit log only and
/// must never reach the response body.
#[derive(Debug, Clone)]
pub struct Denial {
    error: AuthError,
    challenge: Option<String>,
    detail: String,
}

impl Denial {
    /// A 401 for a credential that was presented and failed verification.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Denial {
            error: AuthError::Unauthorized,
            challenge: None,
            detail: detail.into(),
        }
    }

    /// A 403 for a request the bound identity may not make.
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Denial {
            error: AuthError::Forbidden,
            challenge: None,
            detail: detail.into(),
        }
    }

    /// A 500 for an infrastructure fault during verification. Never
    /// downgraded to 401: a backend outage must not read as bad
    /// credentials.
    pub fn internal(detail: impl Into<String>) -> Self {
        Denial {
            error: AuthError::Internal,
            challenge: None,
            detail: detail.into(),
        }
    }

    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = Some(challenge.into());
        self
    }

    pub fn error(&self) -> AuthError {
        self.error
    }

    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// One credential verification strategy.
pub trait CredentialVerifier: Send + Sync {
    /// Stable name, used in audit detail.
    fn name(&self) -> &'static str;

    /// Whether this strategy runs for requests on the given access path.
    fn applies_to(&self, _path: AccessPath) -> bool {
        true
    }

    /// Inspects the request; binds onto `session` on success.
    fn verify(
        &self,
        req: &ServiceRequest,
        session: &mut WebSession,
    ) -> Result<Outcome, Denial>;
}

/// Ordered list of strategies.
#[derive(Clone, Default)]
pub struct VerifierChain {
    verifiers: Vec<Arc<dyn CredentialVerifier>>,
}

impl VerifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy. Order of calls is order of evaluation.
    pub fn verifier(mut self, verifier: impl CredentialVerifier + 'static) -> Self {
        self.verifiers.push(Arc::new(verifier));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    /// Runs every applicable strategy in order. The chain does not stop at
    /// the first success; later strategies may rebind the identity. The
    /// first [`Denial`] stops everything.
    pub fn run(&self, req: &ServiceRequest, session: &mut WebSession) -> Result<(), Denial> {
        let path = session.access_path();
        for verifier in &self.verifiers {
            if !verifier.applies_to(path) {
                continue;
            }
            verifier.verify(req, session)?;
        }
        Ok(())
    }
}
