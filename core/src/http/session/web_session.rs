//! Per-request session state.
//!
//! A [`WebSession`] is constructed fresh for every request and never shared
//! across requests. It is a view over at most one stored record, plus
//! request-scoped access-path flags and the cookie write scheduled for the
//! response.
//!
//! Two states: Anonymous and Identified. A missing or expired cookie is not
//! an error, it simply yields Anonymous; so does a cookie whose record
//! points at a now-inactive account (fail closed, nothing surfaced to the
//! client beyond later authorization failures).

use std::sync::Arc;
use std::time::SystemTime;

use actix_web::dev::ServiceRequest;
use actix_web::HttpMessage;

use crate::http::auth::accounts::{AccountId, AccountService};
use crate::http::auth::audit::{AuthEvent, AuthEventType};
use crate::http::error::AuthError;
use crate::http::session::csrf::{fixed_time_eq, CsrfGuard};
use crate::http::session::store::{SessionRecord, SessionStore};
use crate::http::session::token::SessionKey;

/// Query parameter accepted in place of the cookie on non-git requests.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Coarse classification of the request surface an authentication has been
/// deemed valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// git-over-http transport.
    Git,
    /// REST API calls, CSRF-checked.
    RestApi,
    /// Anything else.
    Unknown,
}

impl AccessPath {
    fn index(self) -> usize {
        match self {
            AccessPath::Git => 0,
            AccessPath::RestApi => 1,
            AccessPath::Unknown => 2,
        }
    }
}

/// Session cookie update scheduled for the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieWrite {
    /// (Re)write the cookie with the encoded key and this Max-Age
    /// (`-1` means a browser-session cookie without Max-Age).
    Set { value: String, max_age_secs: i64 },
    /// Clear the cookie (empty value, Max-Age zero).
    Clear,
}

/// Per-request view over one session record.
pub struct WebSession {
    store: Arc<SessionStore>,
    accounts: Arc<dyn AccountService>,
    path: AccessPath,
    key: Option<SessionKey>,
    record: Option<SessionRecord>,
    /// Identity bound for this request only; never persisted, never cookied.
    request_user: Option<AccountId>,
    ok_paths: [bool; 3],
    pending_cookie: Option<CookieWrite>,
    trail: Vec<AuthEvent>,
}

impl WebSession {
    /// An unauthenticated session carrying no credential material.
    pub fn anonymous(
        store: Arc<SessionStore>,
        accounts: Arc<dyn AccountService>,
        path: AccessPath,
    ) -> Self {
        WebSession {
            store,
            accounts,
            path,
            key: None,
            record: None,
            request_user: None,
            ok_paths: [false; 3],
            pending_cookie: None,
            trail: Vec::new(),
        }
    }

    /// Resolves the incoming token, if any, into a bound session.
    ///
    /// The token is read from the session cookie, or, for non-git requests
    /// only, from the access-token query parameter. A record found past its
    /// refresh point is reissued in place with the same `session_id` and
    /// `auth_secret` (sliding window), and the refreshed cookie is
    /// scheduled on the response.
    pub fn from_request(
        req: &ServiceRequest,
        store: Arc<SessionStore>,
        accounts: Arc<dyn AccountService>,
        csrf: &CsrfGuard,
        cookie_name: &str,
        path: AccessPath,
    ) -> Self {
        let mut session = Self::anonymous(store, accounts, path);

        let token = req
            .cookie(cookie_name)
            .map(|c| c.value().to_string())
            .or_else(|| {
                if path == AccessPath::Git {
                    None
                } else {
                    query_param(req.query_string(), ACCESS_TOKEN_PARAM)
                }
            });
        let Some(token) = token else {
            return session;
        };

        let key = SessionKey::from_encoded(token);
        let Some(record) = session.store.get(&key) else {
            return session;
        };

        match session.accounts.by_id(record.account_id) {
            Ok(Some(account)) if account.active => {}
            Ok(_) => {
                // Valid record, dead account. Anonymous, no ok paths.
                session.push_event(
                    AuthEvent::new(AuthEventType::InactiveAccount)
                        .principal(record.account_id.to_string()),
                );
                return session;
            }
            Err(e) => {
                session.push_event(
                    AuthEvent::new(AuthEventType::AuthenticationFailure)
                        .principal(record.account_id.to_string())
                        .detail(format!("account lookup failed: {}", e)),
                );
                return session;
            }
        }

        if let (Some(secret), Some(echoed)) = (record.auth_secret.as_deref(), csrf.header_value(req))
        {
            if fixed_time_eq(secret.as_bytes(), echoed.as_bytes()) {
                session.set_access_path_ok(AccessPath::RestApi, true);
            } else {
                session.push_event(
                    AuthEvent::new(AuthEventType::CsrfRejected)
                        .principal(record.account_id.to_string()),
                );
            }
        }

        let record = if record.refresh_cookie_at <= SystemTime::now() {
            let refreshed = session.store.create_record(
                &key,
                record.account_id,
                record.persistent_cookie,
                record.external_id.clone(),
                record.session_id.clone(),
                record.auth_secret.clone(),
            );
            session.pending_cookie = Some(CookieWrite::Set {
                value: key.as_str().to_string(),
                max_age_secs: session.store.cookie_age_secs(&refreshed),
            });
            session.push_event(
                AuthEvent::new(AuthEventType::SessionRefreshed)
                    .principal(refreshed.account_id.to_string()),
            );
            refreshed
        } else {
            record
        };

        session.key = Some(key);
        session.record = Some(record);
        session
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Establishes a new stored session for `account`.
    ///
    /// Any previously bound record is destroyed first. Inactive accounts
    /// never bind: the session stays Anonymous and no record is created.
    pub fn login(
        &mut self,
        account: AccountId,
        external_id: Option<String>,
        remember: bool,
    ) -> Result<(), AuthError> {
        if let Some(old_key) = self.key.take() {
            self.store.destroy(&old_key);
            if self.record.take().is_some() {
                self.push_event(
                    AuthEvent::new(AuthEventType::SessionDestroyed).detail("re-login"),
                );
            }
        }

        let active = matches!(self.accounts.by_id(account), Ok(Some(a)) if a.active);
        if !active {
            self.record = None;
            self.request_user = None;
            self.push_event(
                AuthEvent::new(AuthEventType::AuthenticationFailure)
                    .principal(account.to_string())
                    .detail("login refused: account missing or inactive"),
            );
            return Err(AuthError::Unauthorized);
        }

        let key = self.store.create_key(account);
        let record = self
            .store
            .create_record(&key, account, remember, external_id, None, None);
        self.pending_cookie = Some(CookieWrite::Set {
            value: key.as_str().to_string(),
            max_age_secs: self.store.cookie_age_secs(&record),
        });
        self.push_event(
            AuthEvent::new(AuthEventType::SessionCreated).principal(account.to_string()),
        );
        self.key = Some(key);
        self.record = Some(record);
        self.request_user = None;
        Ok(())
    }

    /// Binds an identity for this request only.
    ///
    /// Used by impersonation and by credential strategies that authenticate
    /// fresh on every request (Basic, trusted header, OAuth). Never touches
    /// the store and never produces a cookie.
    pub fn set_user_account_id(&mut self, account: AccountId) {
        self.request_user = Some(account);
    }

    /// Destroys any bound record and schedules the cookie to be cleared.
    pub fn logout(&mut self) {
        if let Some(key) = self.key.take() {
            self.store.destroy(&key);
            if self.record.is_some() {
                self.push_event(AuthEvent::new(AuthEventType::SessionDestroyed));
            }
        }
        self.record = None;
        self.request_user = None;
        self.pending_cookie = Some(CookieWrite::Clear);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn is_signed_in(&self) -> bool {
        self.request_user.is_some() || self.record.is_some()
    }

    /// The effective identity: a request-only binding wins over the stored
    /// record (impersonation rebinds without disturbing the cookie).
    pub fn current_user(&self) -> Option<AccountId> {
        self.request_user
            .or_else(|| self.record.as_ref().map(|r| r.account_id))
    }

    /// The stable per-login audit identifier, when record-backed.
    pub fn session_id(&self) -> Option<&str> {
        self.record.as_ref()?.session_id.as_deref()
    }

    /// The CSRF secret bound to this login, or `None` when Anonymous or
    /// bound only for this request.
    pub fn csrf_secret(&self) -> Option<&str> {
        self.record.as_ref()?.auth_secret.as_deref()
    }

    /// Constant-effort comparison against the bound CSRF secret.
    pub fn is_valid_csrf(&self, value: &str) -> bool {
        match self.csrf_secret() {
            Some(secret) => fixed_time_eq(secret.as_bytes(), value.as_bytes()),
            None => false,
        }
    }

    /// The access path this request was classified under.
    pub fn access_path(&self) -> AccessPath {
        self.path
    }

    pub fn is_access_path_ok(&self, path: AccessPath) -> bool {
        self.ok_paths[path.index()]
    }

    pub fn set_access_path_ok(&mut self, path: AccessPath, ok: bool) {
        self.ok_paths[path.index()] = ok;
    }

    // -------------------------------------------------------------------------
    // Response plumbing (middleware-facing)
    // -------------------------------------------------------------------------

    /// The session key currently bound, for tests and diagnostics.
    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    pub(crate) fn push_event(&mut self, event: AuthEvent) {
        self.trail.push(event);
    }

    /// Drains the request-scoped audit trail.
    pub fn take_trail(&mut self) -> Vec<AuthEvent> {
        std::mem::take(&mut self.trail)
    }

    /// Takes the scheduled cookie write, if any.
    pub fn take_cookie_write(&mut self) -> Option<CookieWrite> {
        self.pending_cookie.take()
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    query
        .split('&')
        .find(|pair| pair.starts_with(&prefix))
        .map(|pair| pair[prefix.len()..].to_string())
        .filter(|v| !v.is_empty())
}
