use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    accounts::repo_types::Identity,
    auth::claims::{Claims, OAuthStateClaims},
    config::JwtConfig,
    error::{AuthError, AuthResult},
    state::AppState,
};

const OAUTH_STATE_PURPOSE: &str = "google_oauth_state";
pub const OAUTH_STATE_TTL_SECS: i64 = 10 * 60;

/// Session token issuer. Built once from config at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::from_secs((config.ttl_days.max(0) as u64) * 24 * 60 * 60),
        }
    }

    pub fn sign(&self, identity: &Identity) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: identity.id,
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            is_admin: identity.is_admin,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(e.into()))?;
        debug!(user_id = %identity.id, "jwt signed");
        Ok(token)
    }

    /// Checks signature and expiry. Every failure reads as `Unauthenticated`.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let validation = Validation::default();
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError::Unauthenticated
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    /// Short-lived `state` value for the Google browser flow.
    pub fn sign_oauth_state(&self, nonce: &str) -> AuthResult<String> {
        let exp = OffsetDateTime::now_utc() + TimeDuration::seconds(OAUTH_STATE_TTL_SECS);
        let claims = OAuthStateClaims {
            nonce: nonce.to_string(),
            purpose: OAUTH_STATE_PURPOSE.to_string(),
            exp: exp.unix_timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| AuthError::Internal(e.into()))
    }

    /// Returns the nonce carried by a valid, unexpired state value.
    pub fn verify_oauth_state(&self, state: &str) -> AuthResult<String> {
        let data = decode::<OAuthStateClaims>(state, &self.decoding, &Validation::default())
            .map_err(|e| {
                debug!(error = %e, "oauth state rejected");
                AuthError::InvalidExternalToken
            })?;
        if data.claims.purpose != OAUTH_STATE_PURPOSE {
            return Err(AuthError::InvalidExternalToken);
        }
        Ok(data.claims.nonce)
    }
}
