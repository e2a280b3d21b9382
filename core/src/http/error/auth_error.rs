use actix_web::{error, http::StatusCode, HttpResponse, HttpResponseBuilder};
use derive_more::{Display, Error};

/// Authentication errors surfaced to the client.
///
/// Response bodies are deliberately generic: an unknown account and a wrong
/// password produce the same `Unauthorized`, so the response never confirms
/// whether an account exists. Detail lives in the audit log only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum AuthError {
    /// Credential material was present but did not verify (401).
    #[display("unauthorized")]
    Unauthorized,
    /// The credential was valid but the action is not permitted (403).
    #[display("forbidden")]
    Forbidden,
    /// A delegated verifier or resolver failed unexpectedly (500).
    #[display("internal authentication error")]
    Internal,
}

impl error::ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match *self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.status_code()).body(self.to_string())
    }
}
