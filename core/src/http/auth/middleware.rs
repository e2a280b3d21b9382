//! Session authentication middleware.
//!
//! One wrap-around layer per application: classifies the request path,
//! resolves the session cookie, runs the configured credential strategies
//! in order, exposes the session to handlers, and writes the scheduled
//! session and CSRF cookies onto the response.
//!
//! # Example
//! ```ignore
//! App::new().wrap(
//!     SessionAuth::new(store, accounts)
//!         .verifier(BasicAuthVerifier::new(config, accounts, encoder))
//!         .audit(AuditLog::stdout()),
//! )
//! ```

use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ResponseError;
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponseBuilder};
use futures_util::future::{ok, LocalBoxFuture, Ready};

use crate::http::auth::accounts::AccountService;
use crate::http::auth::audit::{AuditLog, AuthEvent, AuthEventType};
use crate::http::auth::extractor::SessionHandle;
use crate::http::auth::paths::PathClassifier;
use crate::http::auth::verifier::{CredentialVerifier, VerifierChain};
use crate::http::session::{AccessPath, CookieWrite, CsrfGuard, SessionStore, WebSession};

// =============================================================================
// Cookie configuration
// =============================================================================

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    name: String,
    path: String,
    domain: Option<String>,
    secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieConfig {
    pub fn new() -> Self {
        CookieConfig {
            name: "GatehouseAccount".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Forces the Secure attribute even for requests that arrive over
    /// plain http (e.g. behind a TLS-terminating proxy).
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Materializes a scheduled write into a response cookie.
    fn build(&self, write: CookieWrite, secure: bool) -> Cookie<'static> {
        let builder = match write {
            CookieWrite::Set { value, max_age_secs } => {
                let builder = Cookie::build(self.name.clone(), value)
                    .path(self.path.clone())
                    .secure(secure)
                    .http_only(true);
                if max_age_secs >= 0 {
                    builder.max_age(CookieDuration::seconds(max_age_secs))
                } else {
                    builder
                }
            }
            CookieWrite::Clear => Cookie::build(self.name.clone(), "")
                .path(self.path.clone())
                .secure(secure)
                .http_only(true)
                .max_age(CookieDuration::ZERO),
        };
        match &self.domain {
            Some(domain) => builder.domain(domain.clone()).finish(),
            None => builder.finish(),
        }
    }
}

// =============================================================================
// Middleware factory
// =============================================================================

struct Inner {
    store: Arc<SessionStore>,
    accounts: Arc<dyn AccountService>,
    chain: VerifierChain,
    csrf: CsrfGuard,
    cookie: CookieConfig,
    classifier: PathClassifier,
    audit: AuditLog,
}

/// Session authentication middleware factory.
#[derive(Clone)]
pub struct SessionAuth {
    inner: Rc<Inner>,
}

impl SessionAuth {
    pub fn new(store: Arc<SessionStore>, accounts: Arc<dyn AccountService>) -> Self {
        SessionAuth {
            inner: Rc::new(Inner {
                store,
                accounts,
                chain: VerifierChain::new(),
                csrf: CsrfGuard::new(),
                cookie: CookieConfig::new(),
                classifier: PathClassifier::new(),
                audit: AuditLog::new(),
            }),
        }
    }

    fn map(self, f: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = Inner {
            store: self.inner.store.clone(),
            accounts: self.inner.accounts.clone(),
            chain: self.inner.chain.clone(),
            csrf: self.inner.csrf.clone(),
            cookie: self.inner.cookie.clone(),
            classifier: self.inner.classifier.clone(),
            audit: self.inner.audit.clone(),
        };
        f(&mut inner);
        SessionAuth {
            inner: Rc::new(inner),
        }
    }

    /// Appends a credential strategy; call order is evaluation order.
    pub fn verifier(self, verifier: impl CredentialVerifier + 'static) -> Self {
        self.map(|inner| inner.chain = std::mem::take(&mut inner.chain).verifier(verifier))
    }

    pub fn chain(self, chain: VerifierChain) -> Self {
        self.map(|inner| inner.chain = chain)
    }

    pub fn csrf(self, csrf: CsrfGuard) -> Self {
        self.map(|inner| inner.csrf = csrf)
    }

    pub fn cookie(self, cookie: CookieConfig) -> Self {
        self.map(|inner| inner.cookie = cookie)
    }

    pub fn classifier(self, classifier: PathClassifier) -> Self {
        self.map(|inner| inner.classifier = classifier)
    }

    pub fn audit(self, audit: AuditLog) -> Self {
        self.map(|inner| inner.audit = audit)
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionAuthMiddleware {
            inner: Rc::clone(&self.inner),
            service: Rc::new(service),
        })
    }
}

// =============================================================================
// Middleware service
// =============================================================================

/// Session authentication middleware service.
pub struct SessionAuthMiddleware<S> {
    inner: Rc<Inner>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let inner = Rc::clone(&self.inner);
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let path = inner.classifier.classify(req.path());
            let secure =
                inner.cookie.secure || req.connection_info().scheme() == "https";

            let mut session = WebSession::from_request(
                &req,
                inner.store.clone(),
                inner.accounts.clone(),
                &inner.csrf,
                inner.cookie.get_name(),
                path,
            );

            if let Err(denial) = inner.chain.run(&req, &mut session) {
                let trail = session.take_trail();
                inner.audit.publish_all(trail.iter());
                inner.audit.publish(
                    &AuthEvent::new(AuthEventType::AuthenticationFailure)
                        .detail(denial.detail().to_string()),
                );

                let error = denial.error();
                let mut builder = HttpResponseBuilder::new(error.status_code());
                if let Some(challenge) = denial.challenge() {
                    builder.insert_header((header::WWW_AUTHENTICATE, challenge.to_string()));
                }
                // The body is the generic error text, never the detail.
                let mut response = builder.body(error.to_string());
                if path != AccessPath::Git {
                    let cookie = inner.csrf.response_cookie(&session, secure);
                    if let Err(e) = response.add_cookie(&cookie) {
                        eprintln!("Warning: failed to set csrf cookie: {}", e);
                    }
                }
                let response = response.map_into_right_body();
                return Ok(req.into_response(response));
            }

            let handle = SessionHandle::new(session);
            req.extensions_mut().insert(handle.clone());

            let res = service.call(req).await?;
            let mut res = res.map_into_left_body();

            let (cookie_write, csrf_cookie, trail) = handle.with(|session| {
                let csrf_cookie = if path != AccessPath::Git {
                    Some(inner.csrf.response_cookie(session, secure))
                } else {
                    None
                };
                (session.take_cookie_write(), csrf_cookie, session.take_trail())
            });

            if let Some(write) = cookie_write {
                let cookie = inner.cookie.build(write, secure);
                if let Err(e) = res.response_mut().add_cookie(&cookie) {
                    eprintln!("Warning: failed to set session cookie: {}", e);
                }
            }
            if let Some(cookie) = csrf_cookie {
                if let Err(e) = res.response_mut().add_cookie(&cookie) {
                    eprintln!("Warning: failed to set csrf cookie: {}", e);
                }
            }
            inner.audit.publish_all(trail.iter());

            Ok(res)
        })
    }
}
