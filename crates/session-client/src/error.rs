//! Authentication error types.

use session_storage::StorageError;
use std::collections::HashMap;
use thiserror::Error;

/// Authentication error type.
///
/// Every failure the session client can surface carries an HTTP-like
/// status (see [`AuthError::status`]) so callers can branch on it the
/// same way regardless of whether the server or the client raised the
/// error.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The server rejected the access credential (the refreshable 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Field-level validation failure; `field_errors` maps field name
    /// to the server-provided message for that field
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        field_errors: HashMap<String, String>,
    },

    /// No persisted refresh credential to recover the session with
    #[error("No refresh token")]
    NoRefreshToken,

    /// A success response from the server was missing required fields
    #[error("invalid server response")]
    InvalidResponse,

    /// Any other server rejection, with the best-effort extracted message
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// HTTP-like status code for this error. Client-raised errors map
    /// to 500, transport errors to the response status when one exists.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::Unauthorized => 401,
            AuthError::NoRefreshToken => 401,
            AuthError::Validation { status, .. } => *status,
            AuthError::InvalidResponse => 500,
            AuthError::Server { status, .. } => *status,
            AuthError::Storage(_) => 500,
            AuthError::Http(e) => e.status().map(|s| s.as_u16()).unwrap_or(500),
        }
    }

    /// Per-field validation messages, when the server provided any.
    pub fn field_errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            AuthError::Validation { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Returns true if this failure can be recovered by refreshing the
    /// access credential and retrying.
    ///
    /// Matches on status alone, so any 401 triggers the refresh path.
    /// A stricter predicate would match only [`AuthError::Unauthorized`];
    /// see DESIGN.md for why the looser one is in place.
    pub fn is_refreshable(&self) -> bool {
        self.status() == 401
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
