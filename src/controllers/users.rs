use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::AuthUser;
use crate::models::{user::normalize_email, ProfileUpdate, User};
use crate::services::auth::TokenPair;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(obtain_token))
        .route("/token/refresh", post(refresh_token))
        .route("/token/verify", post(verify_token))
        .route("/me", get(me).patch(update_me))
}

// POST /api/user/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    password: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    last_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = User::create(
        &state.db.pool,
        &req.email,
        &req.password,
        req.first_name.trim(),
        req.last_name.trim(),
        false,
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/user/token
#[derive(Debug, Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

async fn obtain_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TokenRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = User::find_by_email(&state.db.pool, &normalize_email(&req.email))
        .await?
        .filter(|user| user.is_active && user.verify_password(&req.password));

    let Some(user) = user else {
        tracing::info!("Login failed");
        return Err(AppError::Unauthorized(
            "No active account found with the given credentials".to_string(),
        ));
    };

    let pair = state.tokens.issue_pair(user.id)?;
    tracing::debug!(user_id = user.id, "Token pair issued");
    Ok(Json(pair))
}

// POST /api/user/token/refresh
#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh: String,
}

#[derive(Debug, Serialize)]
struct AccessResponse {
    access: String,
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> AppResult<Json<AccessResponse>> {
    let access = state.tokens.refresh(&req.refresh)?;
    Ok(Json(AccessResponse { access }))
}

// POST /api/user/token/verify
#[derive(Debug, Deserialize)]
struct VerifyRequest {
    token: String,
}

async fn verify_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<VerifyRequest>,
) -> AppResult<Json<Value>> {
    state.tokens.decode(&req.token)?;
    Ok(Json(json!({})))
}

// GET /api/user/me
async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<User>> {
    User::find_by_id(&state.db.pool, user.user_id)
        .await?
        .map(Json)
        .ok_or_else(AppError::not_found)
}

// PATCH /api/user/me
async fn update_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(changes): AppJson<ProfileUpdate>,
) -> AppResult<Json<User>> {
    changes.validate()?;

    let updated = User::update_profile(&state.db.pool, user.user_id, &changes)
        .await?
        .ok_or_else(AppError::not_found)?;

    tracing::info!(user_id = updated.id, "Profile updated");
    Ok(Json(updated))
}
