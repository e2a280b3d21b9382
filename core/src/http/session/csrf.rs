//! Double-submit CSRF defense, cryptographically tied to the session.
//!
//! The session's `auth_secret` is issued verbatim in a script-readable
//! cookie; state-changing REST calls must echo it back in a custom header.
//! The comparison is byte-for-byte against the secret bound to the session
//! record, so the cookie can only satisfy the check for the login that
//! issued it.
//!
//! A mismatched or absent header never fails the whole request; it only
//! withholds the `RestApi` access-path flag. Other strategies can still
//! authorize the request through their own access path.

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceRequest;

use crate::http::session::web_session::WebSession;

/// Issues and validates the CSRF cookie/header pair.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    cookie_name: String,
    header_name: String,
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfGuard {
    pub fn new() -> Self {
        CsrfGuard {
            cookie_name: "XSRF_TOKEN".to_string(),
            header_name: "X-Gatehouse-Auth".to_string(),
        }
    }

    pub fn cookie_name(mut self, name: &str) -> Self {
        self.cookie_name = name.to_string();
        self
    }

    pub fn header_name(mut self, name: &str) -> Self {
        self.header_name = name.to_string();
        self
    }

    pub fn get_cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn get_header_name(&self) -> &str {
        &self.header_name
    }

    /// The CSRF value the client echoed back, if any.
    pub fn header_value(&self, req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get(self.header_name.as_str())?
            .to_str()
            .ok()
            .map(str::to_string)
    }

    /// Builds the cookie for a response to a non-git request.
    ///
    /// Identified sessions get the auth secret verbatim as a
    /// browser-session cookie; anonymous ones get an empty value with
    /// max-age zero, which removes any stale cookie. Script access is
    /// intentional: the client reads the value to set the header.
    pub fn response_cookie(&self, session: &WebSession, secure: bool) -> Cookie<'static> {
        match session.csrf_secret() {
            Some(secret) => Cookie::build(self.cookie_name.clone(), secret.to_string())
                .path("/")
                .secure(secure)
                .http_only(false)
                .finish(),
            None => Cookie::build(self.cookie_name.clone(), "")
                .path("/")
                .secure(secure)
                .http_only(false)
                .max_age(CookieDuration::ZERO)
                .finish(),
        }
    }
}

/// Equality in time independent of where the inputs diverge.
pub(crate) fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
