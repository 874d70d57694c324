//! Application error types for regauth
//!
//! Every failure a token request can hit is classified into one of the
//! variants below, and each variant maps to exactly one HTTP status. Errors
//! use `thiserror` and are returned to the registry client as plain text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Classified outcome of a failed token request
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The request itself is unusable: missing service, malformed scope,
    /// or conflicting account/basic-auth user
    #[error("{0}")]
    BadRequest(String),

    /// Credentials are missing, or an anonymous scoped request was made
    #[error("authentication required")]
    Unauthorized,

    /// The identity is known but has no usable access, or the credential
    /// store does not know the user
    #[error("no access")]
    Forbidden,

    /// Store communication/payload failure or signing failure
    #[error("internal server error")]
    Internal,

    /// The credential store answered with a status we have no mapping for
    #[error("credential store returned HTTP {0}")]
    Upstream(u16),
}

impl AuthError {
    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal | AuthError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
