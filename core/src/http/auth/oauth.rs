//! OAuth bearer-token authentication for git-over-http.
//!
//! Tokens arrive in one of two shapes: inside a `Basic` authorization
//! header with the token in the password slot, or in a per-user cookie
//! whose name carries a configured prefix and the username as suffix.
//!
//! A token may name its issuing provider with a trailing
//! `@plugin-name:provider-name` suffix, split on the LAST `@` and the LAST
//! `:`. Without a suffix the token is only accepted when exactly one
//! provider is registered. Verification itself is delegated to the
//! registered [`OAuthTokenVerifier`] for that provider.

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use actix_web::http::header;
use actix_web::HttpMessage;

use crate::http::auth::accounts::{AccountService, BackendError, OAuthTokenVerifier};
use crate::http::auth::audit::{AuthEvent, AuthEventType};
use crate::http::auth::basic::decode_basic;
use crate::http::auth::verifier::{CredentialVerifier, Denial, Outcome};
use crate::http::session::{AccessPath, WebSession};

/// OAuth strategy configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    cookie_prefix: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthConfig {
    pub fn new() -> Self {
        OAuthConfig {
            cookie_prefix: "git-oauth-".to_string(),
        }
    }

    pub fn cookie_prefix(mut self, prefix: &str) -> Self {
        self.cookie_prefix = prefix.to_string();
        self
    }

    pub fn get_cookie_prefix(&self) -> &str {
        &self.cookie_prefix
    }
}

/// Registered token verifiers, keyed by `plugin-name:provider-name`.
#[derive(Clone, Default)]
pub struct OAuthProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthTokenVerifier>>,
}

impl OAuthProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        plugin: &str,
        provider: &str,
        verifier: Arc<dyn OAuthTokenVerifier>,
    ) -> Self {
        self.providers
            .insert(format!("{}:{}", plugin, provider), verifier);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn OAuthTokenVerifier>> {
        self.providers.get(key)
    }

    /// The only registered provider, when there is exactly one.
    pub fn single(&self) -> Option<&Arc<dyn OAuthTokenVerifier>> {
        if self.providers.len() == 1 {
            self.providers.values().next()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Splits `token[@plugin:provider]` on the last `@`.
///
/// `Err` carries audit detail for a suffix that is present but malformed.
fn split_provider(secret: &str) -> Result<(&str, Option<&str>), String> {
    match secret.rfind('@') {
        None => Ok((secret, None)),
        Some(at) => {
            let (token, suffix) = (&secret[..at], &secret[at + 1..]);
            if token.is_empty() {
                return Err("oauth: empty token before provider suffix".to_string());
            }
            match suffix.rfind(':') {
                Some(colon) if colon > 0 && colon < suffix.len() - 1 => Ok((token, Some(suffix))),
                _ => Err(format!("oauth: malformed provider suffix {:?}", suffix)),
            }
        }
    }
}

/// OAuth bearer-token strategy.
pub struct OAuthVerifier {
    config: OAuthConfig,
    registry: OAuthProviderRegistry,
    accounts: Arc<dyn AccountService>,
    only_paths: Option<Vec<AccessPath>>,
}

impl OAuthVerifier {
    pub fn new(
        config: OAuthConfig,
        registry: OAuthProviderRegistry,
        accounts: Arc<dyn AccountService>,
    ) -> Self {
        OAuthVerifier {
            config,
            registry,
            accounts,
            only_paths: None,
        }
    }

    /// Restricts the strategy to the given access paths; by default it
    /// runs everywhere.
    pub fn paths(mut self, paths: &[AccessPath]) -> Self {
        self.only_paths = Some(paths.to_vec());
        self
    }

    /// Pulls `(username, secret)` from the header or the prefixed cookie.
    fn credentials(&self, req: &ServiceRequest) -> Result<Option<(String, String)>, Denial> {
        if let Some(value) = req.headers().get(header::AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|_| Denial::unauthorized("oauth: authorization header is not ascii"))?;
            if let Some(pair) =
                decode_basic(value).map_err(|d| Denial::unauthorized(format!("oauth: {}", d)))?
            {
                return Ok(Some(pair));
            }
        }

        if let Ok(cookies) = req.cookies() {
            for cookie in cookies.iter() {
                if let Some(username) = cookie.name().strip_prefix(&self.config.cookie_prefix) {
                    if !username.is_empty() {
                        return Ok(Some((username.to_string(), cookie.value().to_string())));
                    }
                }
            }
        }
        Ok(None)
    }

    fn bind(&self, username: &str, verifier: &dyn OAuthTokenVerifier, token: &str, session: &mut WebSession) -> Result<Outcome, Denial> {
        let id = match verifier.verify(username, token) {
            Ok(id) => id,
            Err(BackendError::Unavailable(e)) => {
                return Err(Denial::internal(format!("oauth: provider unavailable: {}", e)))
            }
            Err(e) => {
                return Err(Denial::unauthorized(format!(
                    "oauth: token rejected for {}: {}",
                    username, e
                )))
            }
        };

        let account = self
            .accounts
            .by_id(id)
            .map_err(|e| Denial::internal(format!("oauth: account lookup failed: {}", e)))?;
        match account {
            Some(a) if a.active => {
                session.set_user_account_id(a.id);
                let path = session.access_path();
                session.set_access_path_ok(path, true);
                session.push_event(
                    AuthEvent::new(AuthEventType::AuthenticationSuccess)
                        .principal(username)
                        .detail("oauth"),
                );
                Ok(Outcome::Authenticated)
            }
            Some(_) => Err(Denial::unauthorized(format!(
                "oauth: account {} is inactive",
                id
            ))),
            None => Err(Denial::unauthorized(format!(
                "oauth: provider returned unknown account {}",
                id
            ))),
        }
    }
}

impl CredentialVerifier for OAuthVerifier {
    fn name(&self) -> &'static str {
        "oauth"
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
        let Some((username, secret)) = self.credentials(req)? else {
            return Ok(Outcome::Skipped);
        };
        if secret.is_empty() {
            return Err(Denial::unauthorized(format!(
                "oauth: empty token for {}",
                username
            )));
        }

        let (token, suffix) = split_provider(&secret).map_err(Denial::unauthorized)?;
        let verifier = match suffix {
            Some(key) => self.registry.get(key).ok_or_else(|| {
                Denial::unauthorized(format!("oauth: unknown provider {}", key))
            })?,
            None => self.registry.single().ok_or_else(|| {
                Denial::unauthorized(
                    "oauth: provider suffix required with multiple providers",
                )
            })?,
        };

        self.bind(&username, verifier.as_ref(), token, session)
    }
}
