//! Account & session manager: resolves an inbound credential to an identity,
//! runs the login gate, and mints the session token.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    accounts::{
        repo_types::{Identity, NewLocalAccount, RestoreFields},
        services::{
            check_signup_eligibility, create_local_identity, reconcile_external_identity,
            restore, SignupEligibility,
        },
    },
    auth::{
        claims::Claims,
        dto::{AuthResponse, LoginRequest, SignupRequest},
        eligibility::ensure_can_login,
        google::OAuthClient,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn issue(keys: &JwtKeys, identity: &Identity) -> AuthResult<AuthResponse> {
    Ok(AuthResponse {
        token: keys.sign(identity)?,
        user: identity.summary(),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(state: &AppState, payload: LoginRequest) -> AuthResult<AuthResponse> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "login with malformed email");
        return Err(AuthError::InvalidCredentials);
    }

    let Some(identity) = state.directory.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if identity.is_oauth_only() || !verify_password(&payload.password, &identity.password_hash)? {
        warn!(user_id = %identity.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    ensure_can_login(&identity).inspect_err(|e| {
        warn!(user_id = %identity.id, code = e.code(), "login refused by account state");
    })?;

    let response = issue(&state.keys, &identity)?;
    info!(user_id = %identity.id, "user logged in");
    Ok(response)
}

#[instrument(skip(state, payload))]
pub async fn signup_with_password(
    state: &AppState,
    payload: SignupRequest,
) -> AuthResult<AuthResponse> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AuthError::validation("Invalid email"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation("Password too short"));
    }
    let first_name = payload.first_name.trim().to_string();
    let last_name = payload.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AuthError::validation("First and last name are required"));
    }

    let directory = state.directory.as_ref();
    let eligibility = check_signup_eligibility(directory.find_by_email(&email).await?);
    info!(email = %email, action = eligibility.action(), "signup eligibility");

    let identity = match eligibility {
        SignupEligibility::Block => return Err(AuthError::ConflictingAccount),
        SignupEligibility::Create => {
            let password_hash = hash_password(&payload.password)?;
            create_local_identity(
                directory,
                NewLocalAccount {
                    email,
                    password_hash,
                    first_name,
                    last_name,
                },
            )
            .await?
        }
        SignupEligibility::Restore(existing) => {
            let password_hash = hash_password(&payload.password)?;
            restore(
                directory,
                existing,
                RestoreFields {
                    password_hash: Some(password_hash),
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    avatar_url: None,
                },
            )
            .await?
        }
    };

    let response = issue(&state.keys, &identity)?;
    info!(user_id = %identity.id, "user signed up");
    Ok(response)
}

#[instrument(skip(state, id_token))]
pub async fn authenticate_with_external_token(
    state: &AppState,
    id_token: &str,
    audience: &str,
) -> AuthResult<AuthResponse> {
    let claims = state.provider.verify_id_token(id_token, audience).await?;
    let profile = claims.into_profile()?;

    let identity = reconcile_external_identity(state.directory.as_ref(), profile).await?;
    ensure_can_login(&identity).inspect_err(|e| {
        warn!(user_id = %identity.id, code = e.code(), "external login refused by account state");
    })?;

    let response = issue(&state.keys, &identity)?;
    info!(user_id = %identity.id, "user authenticated with google");
    Ok(response)
}

/// Client id configured for Google, or `MisconfiguredProvider`.
pub fn google_audience(state: &AppState) -> AuthResult<&str> {
    state
        .config
        .google
        .client_id
        .as_deref()
        .ok_or(AuthError::MisconfiguredProvider)
}

/// Browser redirect flow: exchange the code, then take the external token path.
#[instrument(skip(state, code))]
pub async fn complete_google_redirect(state: &AppState, code: &str) -> AuthResult<AuthResponse> {
    let google = &state.config.google;
    let (Some(client_id), Some(client_secret)) =
        (google.client_id.as_deref(), google.client_secret.as_deref())
    else {
        return Err(AuthError::MisconfiguredProvider);
    };

    let id_token = state
        .provider
        .exchange_code(
            code,
            OAuthClient {
                client_id,
                client_secret,
                redirect_uri: &google.redirect_uri,
            },
        )
        .await?;
    authenticate_with_external_token(state, &id_token, client_id).await
}

/// Accepts the raw `Authorization` header value.
pub fn verify_session(keys: &JwtKeys, authorization: Option<&str>) -> AuthResult<Claims> {
    let header = authorization.ok_or(AuthError::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthenticated)?;
    keys.verify(token)
}
