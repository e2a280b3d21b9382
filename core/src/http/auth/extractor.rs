//! Request extractors for handlers running behind the session middleware.
//!
//! # Example
//! ```ignore
//! async fn whoami(account: CurrentAccount) -> impl Responder {
//!     HttpResponse::Ok().body(account.id().to_string())
//! }
//! ```

use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};

use crate::http::auth::accounts::AccountId;
use crate::http::error::AuthError;
use crate::http::session::WebSession;

/// Shared handle to the per-request session.
///
/// The middleware puts one clone into the request extensions; handlers
/// extract it to call `login`/`logout`, and the middleware reads the
/// scheduled cookie write back out of the same session after the handler
/// returns.
#[derive(Clone)]
pub struct SessionHandle(Rc<RefCell<WebSession>>);

impl SessionHandle {
    pub fn new(session: WebSession) -> Self {
        SessionHandle(Rc::new(RefCell::new(session)))
    }

    /// Runs `f` with mutable access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut WebSession) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn is_signed_in(&self) -> bool {
        self.0.borrow().is_signed_in()
    }

    pub fn current_user(&self) -> Option<AccountId> {
        self.0.borrow().current_user()
    }
}

impl FromRequest for SessionHandle {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // Absent only when the middleware is not mounted.
        let handle = req.extensions().get::<SessionHandle>().cloned();
        ready(handle.ok_or(AuthError::Internal))
    }
}

/// The authenticated account, or a 401 when the session is anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentAccount(AccountId);

impl CurrentAccount {
    pub fn id(&self) -> AccountId {
        self.0
    }
}

impl FromRequest for CurrentAccount {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let account = req
            .extensions()
            .get::<SessionHandle>()
            .ok_or(AuthError::Internal)
            .and_then(|handle| handle.current_user().ok_or(AuthError::Unauthorized))
            .map(CurrentAccount);
        ready(account)
    }
}
