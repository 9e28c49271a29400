use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::unique_violation;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::Genre;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/genres", get(list_genres).post(create_genre))
}

// GET /api/theatre/genres
async fn list_genres(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> AppResult<Json<Vec<Genre>>> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY id")
        .fetch_all(&state.db.pool)
        .await?;
    Ok(Json(genres))
}

// POST /api/theatre/genres
#[derive(Debug, Deserialize, Validate)]
struct CreateGenreRequest {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    name: String,
}

async fn create_genre(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppJson(req): AppJson<CreateGenreRequest>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    req.validate()?;

    let genre = sqlx::query_as::<_, Genre>(
        "INSERT INTO genres (name) VALUES ($1) RETURNING id, name",
    )
    .bind(req.name.trim())
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| unique_violation(e, "name", "genre with this name already exists."))?;

    tracing::info!(genre_id = genre.id, "Genre created");
    Ok((StatusCode::CREATED, Json(genre)))
}
