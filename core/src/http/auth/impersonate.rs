//! Impersonation via a run-as header.
//!
//! Lets a privileged, already-authenticated caller act as another account
//! for a single request. Runs last in the chain so the caller's own
//! credential has already been verified. The rebinding is request-only:
//! the caller's session record and cookie are untouched.
//!
//! Targets are resolved flexibly (username, then email, then numeric id);
//! every refusal is a 403, except a resolver outage which is a 500.

use std::sync::Arc;

use actix_web::dev::ServiceRequest;

use crate::http::auth::accounts::{AccountError, AccountService, CapabilityChecker};
use crate::http::auth::audit::{AuthEvent, AuthEventType};
use crate::http::auth::verifier::{CredentialVerifier, Denial, Outcome};
use crate::http::session::WebSession;

/// Impersonation configuration. Off unless explicitly enabled.
#[derive(Debug, Clone)]
pub struct ImpersonationConfig {
    enabled: bool,
    header: String,
}

impl Default for ImpersonationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpersonationConfig {
    pub fn new() -> Self {
        ImpersonationConfig {
            enabled: false,
            header: "X-Run-As".to_string(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn header(mut self, header: &str) -> Self {
        self.header = header.to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_header(&self) -> &str {
        &self.header
    }
}

/// Run-as strategy. Belongs at the end of the chain.
pub struct ImpersonationVerifier {
    config: ImpersonationConfig,
    accounts: Arc<dyn AccountService>,
    capabilities: Arc<dyn CapabilityChecker>,
}

impl ImpersonationVerifier {
    pub fn new(
        config: ImpersonationConfig,
        accounts: Arc<dyn AccountService>,
        capabilities: Arc<dyn CapabilityChecker>,
    ) -> Self {
        ImpersonationVerifier {
            config,
            accounts,
            capabilities,
        }
    }

    fn denied(&self, session: &mut WebSession, detail: String) -> Denial {
        session.push_event(
            AuthEvent::new(AuthEventType::ImpersonationDenied).detail(detail.clone()),
        );
        Denial::forbidden(detail)
    }
}

impl CredentialVerifier for ImpersonationVerifier {
    fn name(&self) -> &'static str {
        "run-as"
    }

    fn verify(
        &self,
        req: &ServiceRequest,
        session: &mut WebSession,
    ) -> Result<Outcome, Denial> {
        let target = req
            .headers()
            .get(self.config.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let Some(target) = target else {
            return Ok(Outcome::Skipped);
        };

        if !self.config.enabled {
            return Err(self.denied(session, "run-as: impersonation is disabled".to_string()));
        }
        let Some(caller) = session.current_user() else {
            return Err(self.denied(session, "run-as: caller is anonymous".to_string()));
        };
        if !self.capabilities.can_run_as(caller) {
            return Err(self.denied(
                session,
                format!("run-as: caller {} lacks the capability", caller),
            ));
        }

        let resolved = match self.accounts.resolve(target) {
            Ok(resolved) => resolved,
            Err(AccountError::Ambiguous) => {
                return Err(self.denied(
                    session,
                    format!("run-as: target {:?} is ambiguous", target),
                ))
            }
            Err(AccountError::Unavailable(e)) => {
                // Resolver outage, not a policy refusal.
                return Err(Denial::internal(format!(
                    "run-as: account lookup failed: {}",
                    e
                )));
            }
        };
        let account = match resolved {
            Some(a) if a.active => a,
            Some(a) => {
                return Err(self.denied(
                    session,
                    format!("run-as: target account {} is inactive", a.id),
                ))
            }
            None => {
                return Err(self.denied(
                    session,
                    format!("run-as: no account matches {:?}", target),
                ))
            }
        };

        session.set_user_account_id(account.id);
        session.push_event(
            AuthEvent::new(AuthEventType::ImpersonationUsed)
                .principal(caller.to_string())
                .detail(format!("acting as {}", account.id)),
        );
        Ok(Outcome::Authenticated)
    }
}
