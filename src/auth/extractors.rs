use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys, services::verify_session};
use crate::error::AuthError;

/// Validates the bearer token and yields its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let claims = verify_session(&keys, header).inspect_err(|_| {
            warn!("missing, invalid or expired token");
        })?;
        Ok(AuthUser(claims))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.0.is_admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
