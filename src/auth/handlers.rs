use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest, RegisterResponse},
        services,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register).options(preflight))
        .route("/login", post(login).options(preflight))
}

// Bare OPTIONS on the routed paths answers 204 like everywhere else;
// preflights carrying CORS request headers are short-circuited by the
// CORS layer before they get here.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AuthError> {
    let user = services::register(state.store.as_ref(), &payload.username, &payload.password)
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(RegisterResponse {
        ok: true,
        id: user.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let user = services::login(state.store.as_ref(), &payload.username, &payload.password).await?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        ok: true,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
        message: "Login successful",
    }))
}
