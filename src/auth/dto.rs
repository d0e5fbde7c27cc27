use serde::{Deserialize, Serialize};

use crate::accounts::repo_types::IdentitySummary;

/// Request body for password signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body carrying a Google ID token obtained by the frontend.
#[derive(Debug, Deserialize)]
pub struct ExternalTokenRequest {
    pub token: String,
}

/// Query string Google appends to the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Response returned after login, signup or external authentication.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: IdentitySummary,
}
