use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload: the fixed identity claim set plus the validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // user ID
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
}

/// Payload of the signed `state` parameter sent through Google's consent
/// page. The nonce is mirrored in an HttpOnly cookie on the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub nonce: String,
    pub purpose: String,
    pub exp: usize,
}
