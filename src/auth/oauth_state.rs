//! CSRF binding for the Google browser flow. The redirect sets an HttpOnly
//! cookie holding a random nonce and sends the same nonce, signed, as the
//! OAuth `state`. The callback only proceeds when both are present and agree.

use axum::http::{header, HeaderMap};
use cookie::{Cookie, SameSite};
use time::Duration;
use tracing::warn;

use crate::{
    auth::jwt::{JwtKeys, OAUTH_STATE_TTL_SECS},
    error::{AuthError, AuthResult},
};

pub const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/auth/google";

/// Fresh nonce plus the signed `state` value carrying it.
pub fn issue(keys: &JwtKeys) -> AuthResult<(String, String)> {
    let nonce = uuid::Uuid::new_v4().to_string();
    let state = keys.sign_oauth_state(&nonce)?;
    Ok((nonce, state))
}

pub fn state_cookie(nonce: &str, secure: bool) -> String {
    Cookie::build((STATE_COOKIE, nonce.to_string()))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(OAUTH_STATE_TTL_SECS))
        .build()
        .to_string()
}

pub fn clear_state_cookie() -> String {
    Cookie::build((STATE_COOKIE, ""))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}

fn nonce_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|c| Cookie::parse(c.trim()).ok())
        .find(|c| c.name() == STATE_COOKIE)
        .map(|c| c.value().to_string())
}

/// Accepts the callback only when `state` verifies and matches the cookie.
pub fn verify_callback(keys: &JwtKeys, state: Option<&str>, headers: &HeaderMap) -> AuthResult<()> {
    let Some(state) = state.filter(|s| !s.is_empty()) else {
        warn!("google callback without state");
        return Err(AuthError::InvalidExternalToken);
    };
    let signed_nonce = keys.verify_oauth_state(state)?;
    match nonce_from_cookies(headers) {
        Some(cookie_nonce) if cookie_nonce == signed_nonce => Ok(()),
        Some(_) => {
            warn!("google callback state does not match browser cookie");
            Err(AuthError::InvalidExternalToken)
        }
        None => {
            warn!("google callback without state cookie");
            Err(AuthError::InvalidExternalToken)
        }
    }
}
