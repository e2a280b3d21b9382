//! HTTP Basic authentication.
//!
//! Verifies `Authorization: Basic` credentials against the locally stored
//! password hash, a delegated backend, or both, per the configured policy.
//! Every failure that involves a presented credential answers the same
//! generic 401 with a `WWW-Authenticate` challenge; whether the account
//! exists at all is recorded only in the audit detail.
//!
//! A successful Basic authentication is request-scoped. No session record
//! is created and no cookie is issued; the client is expected to resend the
//! header on every request.

use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use actix_web::http::header;
use base64::prelude::*;

use crate::http::auth::accounts::{AccountService, BackendError, CredentialBackend};
use crate::http::auth::audit::{AuthEvent, AuthEventType};
use crate::http::auth::crypto::PasswordEncoder;
use crate::http::auth::verifier::{CredentialVerifier, Denial, Outcome};
use crate::http::session::{AccessPath, WebSession};

/// Where passwords are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicAuthPolicy {
    /// Only the locally stored password hash.
    Local,
    /// Local hash when one is stored, delegated backend otherwise.
    LocalThenDelegate,
    /// Delegated backend first; local hash only when the backend has no
    /// such user.
    DelegateThenLocal,
}

/// Basic authentication configuration.
#[derive(Debug, Clone)]
pub struct BasicAuthConfig {
    realm: String,
    policy: BasicAuthPolicy,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicAuthConfig {
    pub fn new() -> Self {
        BasicAuthConfig {
            realm: "Gatehouse".to_string(),
            policy: BasicAuthPolicy::Local,
        }
    }

    pub fn realm(mut self, realm: &str) -> Self {
        self.realm = realm.to_string();
        self
    }

    pub fn policy(mut self, policy: BasicAuthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn get_realm(&self) -> &str {
        &self.realm
    }

    pub fn get_policy(&self) -> BasicAuthPolicy {
        self.policy
    }

    /// The challenge sent with every 401 this strategy produces.
    pub fn www_authenticate_header(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}

/// Splits a `Basic` authorization header value into username and password.
///
/// Returns `Ok(None)` when the scheme is not `Basic` (another strategy may
/// own the header) and `Err(detail)` when the scheme is `Basic` but the
/// payload does not decode to `user:pass`.
pub(crate) fn decode_basic(value: &str) -> Result<Option<(String, String)>, String> {
    let Some(payload) = value.strip_prefix("Basic ") else {
        return Ok(None);
    };
    let raw = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|_| "basic payload is not valid base64".to_string())?;
    let text =
        String::from_utf8(raw).map_err(|_| "basic payload is not valid utf-8".to_string())?;
    let Some((username, password)) = text.split_once(':') else {
        return Err("basic payload has no colon".to_string());
    };
    if username.is_empty() {
        return Err("basic payload has empty username".to_string());
    }
    Ok(Some((username.to_string(), password.to_string())))
}

/// Basic authentication strategy.
pub struct BasicAuthVerifier {
    config: BasicAuthConfig,
    accounts: Arc<dyn AccountService>,
    encoder: Arc<dyn PasswordEncoder>,
    backend: Option<Arc<dyn CredentialBackend>>,
    only_paths: Option<Vec<AccessPath>>,
}

impl BasicAuthVerifier {
    pub fn new(
        config: BasicAuthConfig,
        accounts: Arc<dyn AccountService>,
        encoder: Arc<dyn PasswordEncoder>,
    ) -> Self {
        BasicAuthVerifier {
            config,
            accounts,
            encoder,
            backend: None,
            only_paths: None,
        }
    }

    /// Attaches the delegated backend used by the non-`Local` policies.
    pub fn backend(mut self, backend: Arc<dyn CredentialBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Restricts the strategy to the given access paths; by default it
    /// runs everywhere.
    pub fn paths(mut self, paths: &[AccessPath]) -> Self {
        self.only_paths = Some(paths.to_vec());
        self
    }

    fn denied(&self, detail: impl Into<String>) -> Denial {
        Denial::unauthorized(detail).with_challenge(self.config.www_authenticate_header())
    }

    /// Checks the locally stored hash. `Ok(true)` means verified.
    fn check_local(&self, username: &str, password: &str) -> Result<bool, Denial> {
        let account = self
            .accounts
            .by_username(username)
            .map_err(|e| Denial::internal(format!("basic: account lookup failed: {}", e)))?;
        let Some(account) = account else {
            return Err(self.denied(format!("basic: no such user {}", username)));
        };
        if !account.active {
            return Err(self.denied(format!("basic: account {} is inactive", account.id)));
        }
        match account.password_hash.as_deref() {
            Some(hash) => Ok(self.encoder.matches(password, hash)),
            None => Ok(false),
        }
    }

    fn verify_local(
        &self,
        username: &str,
        password: &str,
        session: &mut WebSession,
    ) -> Result<Outcome, Denial> {
        if !self.check_local(username, password)? {
            return Err(self.denied(format!("basic: wrong password for {}", username)));
        }
        self.bind(username, session)
    }

    fn verify_delegated(
        &self,
        backend: &dyn CredentialBackend,
        username: &str,
        password: &str,
        session: &mut WebSession,
    ) -> Result<Outcome, Denial> {
        match backend.verify(username, password) {
            Ok(id) => {
                let account = self
                    .accounts
                    .by_id(id)
                    .map_err(|e| Denial::internal(format!("basic: account lookup failed: {}", e)))?;
                match account {
                    Some(a) if a.active => self.bind(username, session),
                    Some(_) => Err(self.denied(format!("basic: account {} is inactive", id))),
                    None => Err(self.denied(format!(
                        "basic: backend returned unknown account {}",
                        id
                    ))),
                }
            }
            Err(BackendError::NoSuchUser) => {
                if self.config.policy == BasicAuthPolicy::DelegateThenLocal {
                    self.verify_local(username, password, session)
                } else {
                    Err(self.denied(format!("basic: backend has no user {}", username)))
                }
            }
            Err(BackendError::BadCredentials) => {
                Err(self.denied(format!("basic: backend rejected password for {}", username)))
            }
            Err(BackendError::Unavailable(e)) => {
                Err(Denial::internal(format!("basic: backend unavailable: {}", e)))
            }
        }
    }

    /// Binds the account behind `username` for this request.
    fn bind(&self, username: &str, session: &mut WebSession) -> Result<Outcome, Denial> {
        let account = self
            .accounts
            .by_username(username)
            .map_err(|e| Denial::internal(format!("basic: account lookup failed: {}", e)))?
            .ok_or_else(|| self.denied(format!("basic: no such user {}", username)))?;

        session.set_user_account_id(account.id);
        let path = session.access_path();
        session.set_access_path_ok(path, true);
        session.push_event(
            AuthEvent::new(AuthEventType::AuthenticationSuccess)
                .principal(username)
                .detail("basic"),
        );
        Ok(Outcome::Authenticated)
    }
}

impl CredentialVerifier for BasicAuthVerifier {
    fn name(&self) -> &'static str {
        "basic"
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
        let Some(value) = req.headers().get(header::AUTHORIZATION) else {
            return Ok(Outcome::Skipped);
        };
        let value = value
            .to_str()
            .map_err(|_| self.denied("basic: authorization header is not ascii"))?;
        let Some((username, password)) =
            decode_basic(value).map_err(|detail| self.denied(format!("basic: {}", detail)))?
        else {
            return Ok(Outcome::Skipped);
        };
        if password.is_empty() {
            return Err(self.denied(format!("basic: empty password for {}", username)));
        }

        match (self.config.policy, self.backend.as_deref()) {
            (BasicAuthPolicy::Local, _) | (_, None) => {
                self.verify_local(&username, &password, session)
            }
            (BasicAuthPolicy::LocalThenDelegate, Some(backend)) => {
                let has_local_hash = self
                    .accounts
                    .by_username(&username)
                    .map_err(|e| {
                        Denial::internal(format!("basic: account lookup failed: {}", e))
                    })?
                    .map(|a| a.password_hash.is_some())
                    .unwrap_or(false);
                if has_local_hash {
                    self.verify_local(&username, &password, session)
                } else {
                    self.verify_delegated(backend, &username, &password, session)
                }
            }
            (BasicAuthPolicy::DelegateThenLocal, Some(backend)) => {
                self.verify_delegated(backend, &username, &password, session)
            }
        }
    }
}
