//! Trusted reverse-proxy header authentication.
//!
//! For deployments where a fronting proxy has already authenticated the
//! user and asserts the username in a header. The asserted value is trusted
//! as-is, so this strategy FAILS CLOSED: when it is configured, a request
//! without the header is refused outright rather than passed through
//! anonymous. A missing header means the proxy was bypassed.

use std::sync::Arc;

use actix_web::dev::ServiceRequest;

use crate::http::auth::accounts::AccountService;
use crate::http::auth::audit::{AuthEvent, AuthEventType};
use crate::http::auth::verifier::{CredentialVerifier, Denial, Outcome};
use crate::http::session::{AccessPath, WebSession};

/// Trusted header configuration.
#[derive(Debug, Clone)]
pub struct TrustedHeaderConfig {
    header: String,
    lowercase_username: bool,
}

impl Default for TrustedHeaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustedHeaderConfig {
    pub fn new() -> Self {
        TrustedHeaderConfig {
            header: "Authorization".to_string(),
            lowercase_username: false,
        }
    }

    pub fn header(mut self, header: &str) -> Self {
        self.header = header.to_string();
        self
    }

    /// Folds asserted usernames to lowercase before lookup, for proxies
    /// that assert mixed-case principals against a lowercase account index.
    pub fn lowercase_username(mut self, lowercase: bool) -> Self {
        self.lowercase_username = lowercase;
        self
    }

    pub fn get_header(&self) -> &str {
        &self.header
    }
}

/// Trusted header strategy.
pub struct TrustedHeaderVerifier {
    config: TrustedHeaderConfig,
    accounts: Arc<dyn AccountService>,
    only_paths: Option<Vec<AccessPath>>,
}

impl TrustedHeaderVerifier {
    pub fn new(config: TrustedHeaderConfig, accounts: Arc<dyn AccountService>) -> Self {
        TrustedHeaderVerifier {
            config,
            accounts,
            only_paths: None,
        }
    }

    /// Restricts the strategy to the given access paths; by default it
    /// runs everywhere. Because absence of the header is a refusal, a
    /// deployment that also serves surfaces the proxy does not front
    /// (interactive login, git) must scope this strategy to the paths
    /// the proxy covers.
    pub fn paths(mut self, paths: &[AccessPath]) -> Self {
        self.only_paths = Some(paths.to_vec());
        self
    }
}

impl CredentialVerifier for TrustedHeaderVerifier {
    fn name(&self) -> &'static str {
        "trusted-header"
    }

    fn applies_to(&self, path: AccessPath) -> bool {
        match &self.only_paths {
            Some(paths) => paths.contains(&path),
            None => true,
        }
    }

    fn verify(
        &self,
        req: &ServiceRequest,
        session: &mut WebSession,
    ) -> Result<Outcome, Denial> {
        if session.is_signed_in() {
            return Ok(Outcome::Skipped);
        }

        let value = req
            .headers()
            .get(self.config.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let Some(asserted) = value else {
            // The proxy always sets the header; its absence means the
            // request did not come through the proxy.
            return Err(Denial::forbidden(format!(
                "trusted-header: {} header absent",
                self.config.header
            )));
        };

        let username = if self.config.lowercase_username {
            asserted.to_lowercase()
        } else {
            asserted.to_string()
        };

        let account = self
            .accounts
            .by_username(&username)
            .map_err(|e| {
                Denial::internal(format!("trusted-header: account lookup failed: {}", e))
            })?;
        let account = match account {
            Some(a) if a.active => a,
            Some(a) => {
                return Err(Denial::unauthorized(format!(
                    "trusted-header: account {} is inactive",
                    a.id
                )))
            }
            None => {
                return Err(Denial::unauthorized(format!(
                    "trusted-header: no such user {}",
                    username
                )))
            }
        };

        session.set_user_account_id(account.id);
        let path = session.access_path();
        session.set_access_path_ok(path, true);
        session.push_event(
            AuthEvent::new(AuthEventType::AuthenticationSuccess)
                .principal(username)
                .detail("trusted-header"),
        );
        Ok(Outcome::Authenticated)
    }
}
