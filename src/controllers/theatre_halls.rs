use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::{AuthUser, StaffUser};
use crate::models::TheatreHall;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/theatre_halls", get(list_halls).post(create_hall))
}

#[derive(Debug, Serialize)]
pub struct HallResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

impl From<TheatreHall> for HallResponse {
    fn from(hall: TheatreHall) -> Self {
        Self {
            capacity: hall.capacity(),
            id: hall.id,
            name: hall.name,
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
        }
    }
}

// GET /api/theatre/theatre_halls
async fn list_halls(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> AppResult<Json<Vec<HallResponse>>> {
    let halls = sqlx::query_as::<_, TheatreHall>(
        "SELECT id, name, rows, seats_in_row FROM theatre_halls ORDER BY id",
    )
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(halls.into_iter().map(HallResponse::from).collect()))
}

// POST /api/theatre/theatre_halls
#[derive(Debug, Deserialize, Validate)]
struct CreateHallRequest {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    name: String,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    rows: i32,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    seats_in_row: i32,
}

async fn create_hall(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppJson(req): AppJson<CreateHallRequest>,
) -> AppResult<(StatusCode, Json<HallResponse>)> {
    req.validate()?;

    let hall = sqlx::query_as::<_, TheatreHall>(
        "INSERT INTO theatre_halls (name, rows, seats_in_row) VALUES ($1, $2, $3)
         RETURNING id, name, rows, seats_in_row",
    )
    .bind(req.name.trim())
    .bind(req.rows)
    .bind(req.seats_in_row)
    .fetch_one(&state.db.pool)
    .await?;

    tracing::info!(hall_id = hall.id, capacity = hall.capacity(), "Theatre hall created");
    Ok((StatusCode::CREATED, Json(hall.into())))
}
