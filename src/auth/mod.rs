use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod eligibility;
pub mod extractors;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod oauth_state;
pub mod password;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
