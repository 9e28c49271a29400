use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::Actor;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/actors", get(list_actors).post(create_actor))
}

#[derive(Debug, Serialize)]
pub struct ActorResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<Actor> for ActorResponse {
    fn from(actor: Actor) -> Self {
        Self {
            full_name: actor.full_name(),
            id: actor.id,
            first_name: actor.first_name,
            last_name: actor.last_name,
        }
    }
}

// GET /api/theatre/actors
async fn list_actors(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> AppResult<Json<Vec<ActorResponse>>> {
    let actors = sqlx::query_as::<_, Actor>(
        "SELECT id, first_name, last_name FROM actors ORDER BY id",
    )
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(actors.into_iter().map(ActorResponse::from).collect()))
}

// POST /api/theatre/actors
#[derive(Debug, Deserialize, Validate)]
struct CreateActorRequest {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    first_name: String,
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    last_name: String,
}

async fn create_actor(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppJson(req): AppJson<CreateActorRequest>,
) -> AppResult<(StatusCode, Json<ActorResponse>)> {
    req.validate()?;

    let actor = sqlx::query_as::<_, Actor>(
        "INSERT INTO actors (first_name, last_name) VALUES ($1, $2)
         RETURNING id, first_name, last_name",
    )
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(actor.into())))
}
