use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    accounts::{
        repo_types::{IdentitySummary, ProfileUpdate},
        services,
    },
    auth::extractors::AuthUser,
    error::{AuthError, AuthResult},
    state::AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(patch_me))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/deactivate", post(deactivate_user))
}

#[instrument(skip(state, user), fields(user_id = %user.0.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AuthResult<Json<IdentitySummary>> {
    let identity = state
        .directory
        .find_by_id(user.0.sub)
        .await?
        .filter(|i| !i.is_deleted)
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(identity.summary()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.0.sub))]
pub async fn patch_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> AuthResult<Json<IdentitySummary>> {
    let identity = services::update_profile(state.directory.as_ref(), user.0.sub, payload).await?;
    info!("profile updated");
    Ok(Json(identity.summary()))
}

/// Soft delete. Admins may delete anyone; users only themselves.
#[instrument(skip(state, user), fields(caller = %user.0.sub))]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<IdentitySummary>> {
    if user.0.sub != id {
        user.require_admin()?;
    }
    let identity = services::soft_delete(state.directory.as_ref(), id).await?;
    Ok(Json(identity.summary()))
}

#[instrument(skip(state, user), fields(caller = %user.0.sub))]
pub async fn activate_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<IdentitySummary>> {
    user.require_admin()?;
    let identity = services::set_active(state.directory.as_ref(), id, true).await?;
    Ok(Json(identity.summary()))
}

#[instrument(skip(state, user), fields(caller = %user.0.sub))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<IdentitySummary>> {
    user.require_admin()?;
    let identity = services::set_active(state.directory.as_ref(), id, false).await?;
    Ok(Json(identity.summary()))
}
