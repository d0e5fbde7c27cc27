//! Error taxonomy shared by the authentication and account handlers.
//!
//! Every failure carries a stable machine-readable code plus a human-readable
//! message. Internal details are logged and never sent to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Kept as one variant so callers cannot
    /// probe which emails are registered.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Soft-deleted account. Reads the same as "no such account".
    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Invalid external identity token")]
    InvalidExternalToken,

    #[error("Identity provider profile is missing {0}")]
    IncompleteProfile(&'static str),

    #[error("An account with this email already exists")]
    ConflictingAccount,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Identity provider is not configured")]
    MisconfiguredProvider,

    #[error("{0}")]
    Validation(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation(message.into())
    }

    /// Stable code clients can match on.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::InvalidExternalToken => "INVALID_EXTERNAL_TOKEN",
            AuthError::IncompleteProfile(_) => "INCOMPLETE_PROFILE",
            AuthError::ConflictingAccount => "CONFLICTING_ACCOUNT",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::MisconfiguredProvider => "MISCONFIGURED_PROVIDER",
            AuthError::Validation(_) => "VALIDATION_FAILED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidExternalToken
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::AccountNotFound | AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::AccountInactive | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::IncompleteProfile(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::ConflictingAccount => StatusCode::CONFLICT,
            AuthError::MisconfiguredProvider | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            AuthError::MisconfiguredProvider => {
                tracing::error!("google client id is not configured");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: self.code(),
            message,
        });
        (self.status(), body).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AuthError::InvalidCredentials.code(), "INVALID_CREDENTIALS");
        assert_eq!(AuthError::AccountNotFound.code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(AuthError::ConflictingAccount.code(), "CONFLICTING_ACCOUNT");
        assert_eq!(AuthError::IncompleteProfile("email").code(), "INCOMPLETE_PROFILE");
    }

    #[test]
    fn internal_error_hides_details() {
        let err = AuthError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::AccountInactive.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ConflictingAccount.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::validation("Invalid email").status(),
            StatusCode::BAD_REQUEST
        );
    }
}
