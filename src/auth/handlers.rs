use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        claims::Claims,
        dto::{AuthResponse, ExternalTokenRequest, LoginRequest, OAuthCallbackParams, SignupRequest},
        extractors::AuthUser,
        google::authorization_url,
        oauth_state, services,
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_token).get(google_redirect))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AuthResult<(StatusCode, Json<AuthResponse>)> {
    let response = services::signup_with_password(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>> {
    Ok(Json(services::login(&state, payload).await?))
}

/// ID token obtained by the frontend's Google button.
#[instrument(skip(state, payload))]
pub async fn google_token(
    State(state): State<AppState>,
    Json(payload): Json<ExternalTokenRequest>,
) -> AuthResult<Json<AuthResponse>> {
    let audience = services::google_audience(&state)?;
    let response =
        services::authenticate_with_external_token(&state, &payload.token, audience).await?;
    Ok(Json(response))
}

/// Starts the browser flow by sending the user to Google's consent page.
/// The nonce cookie binds the eventual callback to this browser.
pub async fn google_redirect(State(state): State<AppState>) -> AuthResult<impl IntoResponse> {
    let client_id = services::google_audience(&state)?;
    let redirect_uri = &state.config.google.redirect_uri;
    let (nonce, csrf_state) = oauth_state::issue(&state.keys)?;
    let cookie = oauth_state::state_cookie(&nonce, redirect_uri.starts_with("https://"));
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to(&authorization_url(client_id, redirect_uri, &csrf_state)),
    ))
}

/// Finishes the browser flow and hands the session token to the frontend.
#[instrument(skip(state, headers, params))]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<OAuthCallbackParams>,
) -> impl IntoResponse {
    let base = format!("{}/auth/callback", state.config.frontend_url);

    let location = match finish_google_callback(&state, &headers, params).await {
        Ok(response) => format!("{base}?token={}", urlencoding::encode(&response.token)),
        Err(e) => {
            warn!(code = e.code(), "google redirect login failed");
            format!("{base}?error={}", e.code())
        }
    };
    (
        [(header::SET_COOKIE, oauth_state::clear_state_cookie())],
        Redirect::to(&location),
    )
}

async fn finish_google_callback(
    state: &AppState,
    headers: &HeaderMap,
    params: OAuthCallbackParams,
) -> AuthResult<AuthResponse> {
    if let Some(error) = params.error {
        warn!(error = %error, "google reported an authorization error");
        return Err(AuthError::InvalidExternalToken);
    }
    oauth_state::verify_callback(&state.keys, params.state.as_deref(), headers)?;
    let code = params.code.ok_or(AuthError::InvalidExternalToken)?;
    services::complete_google_redirect(state, &code).await
}

pub async fn me(AuthUser(claims): AuthUser) -> Json<Claims> {
    Json(claims)
}
