use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use std::sync::Arc;

use super::missing_ids;
use super::plays::{load_play_detail, PlayDetailResponse};
use super::theatre_halls::HallResponse;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{AuthUser, StaffUser};
use crate::models::{timestamps, Performance, SeatPosition, TheatreHall};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/performances", get(list_performances).post(create_performance))
        .route(
            "/performances/{id}",
            get(retrieve_performance)
                .put(replace_performance)
                .patch(update_performance)
                .delete(delete_performance),
        )
}

/* ---------- LIST ---------- */

#[derive(Debug, Default, Deserialize)]
pub struct PerformancesQuery {
    pub date: Option<String>,
    pub play: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PerformanceListItem {
    pub id: i64,
    #[serde(with = "timestamps::utc_naive")]
    pub show_time: NaiveDateTime,
    pub play_title: String,
    pub theatre_hall_name: String,
    pub theatre_hall_capacity: i64,
    pub tickets_available: i64,
}

fn parse_filters(params: &PerformancesQuery) -> Result<(Option<NaiveDate>, Option<i64>), FieldErrors> {
    let mut errors = FieldErrors::new();

    let date = match params.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => timestamps::parse_date(raw)
            .map_err(|msg| errors.add("date", msg))
            .ok(),
        None => None,
    };
    let play = match params.play.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| errors.add("play", format!("\"{raw}\" is not a valid id.")))
            .ok(),
        None => None,
    };

    errors.into_result().map(|_| (date, play))
}

// GET /api/theatre/performances?date=2025-08-01&play=3
async fn list_performances(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppQuery(params): AppQuery<PerformancesQuery>,
) -> AppResult<Json<Vec<PerformanceListItem>>> {
    let (date, play) = parse_filters(&params)?;

    let items = sqlx::query_as::<_, PerformanceListItem>(
        r#"
        SELECT p.id, p.show_time,
               pl.title AS play_title,
               h.name AS theatre_hall_name,
               h.rows::bigint * h.seats_in_row AS theatre_hall_capacity,
               h.rows::bigint * h.seats_in_row - COUNT(t.id) AS tickets_available
        FROM performances p
        JOIN plays pl ON pl.id = p.play_id
        JOIN theatre_halls h ON h.id = p.theatre_hall_id
        LEFT JOIN tickets t ON t.performance_id = p.id
        WHERE ($1::date IS NULL OR p.show_time::date = $1)
          AND ($2::bigint IS NULL OR p.play_id = $2)
        GROUP BY p.id, pl.title, h.name, h.rows, h.seats_in_row
        ORDER BY p.show_time DESC, p.id DESC
        "#,
    )
    .bind(date)
    .bind(play)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(items))
}

/* ---------- DETAIL ---------- */

#[derive(Debug, Serialize)]
pub struct PerformanceDetailResponse {
    pub id: i64,
    #[serde(with = "timestamps::utc_naive")]
    pub show_time: NaiveDateTime,
    pub play: PlayDetailResponse,
    pub theatre_hall: HallResponse,
    pub taken_places: Vec<SeatPosition>,
}

// GET /api/theatre/performances/{id}
async fn retrieve_performance(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<PerformanceDetailResponse>> {
    let pool = &state.db.pool;

    let performance = sqlx::query_as::<_, Performance>(
        "SELECT id, show_time, play_id, theatre_hall_id FROM performances WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(AppError::not_found)?;

    // Cascades keep both references alive for as long as the performance exists
    let play = load_play_detail(pool, performance.play_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let hall = sqlx::query_as::<_, TheatreHall>(
        "SELECT id, name, rows, seats_in_row FROM theatre_halls WHERE id = $1",
    )
    .bind(performance.theatre_hall_id)
    .fetch_one(pool)
    .await?;

    let taken_places = sqlx::query_as::<_, SeatPosition>(
        "SELECT row, seat FROM tickets WHERE performance_id = $1 ORDER BY row, seat",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Json(PerformanceDetailResponse {
        id: performance.id,
        show_time: performance.show_time,
        play,
        theatre_hall: hall.into(),
        taken_places,
    }))
}

/* ---------- WRITE ---------- */

#[derive(Debug, Deserialize)]
struct PerformanceRequest {
    #[serde(with = "timestamps::utc_naive")]
    show_time: NaiveDateTime,
    play: i64,
    theatre_hall: i64,
}

#[derive(Debug, Default, Deserialize)]
struct PerformancePatch {
    #[serde(default, with = "timestamps::utc_naive_option")]
    show_time: Option<NaiveDateTime>,
    play: Option<i64>,
    theatre_hall: Option<i64>,
}

impl From<PerformanceRequest> for PerformancePatch {
    fn from(req: PerformanceRequest) -> Self {
        Self {
            show_time: Some(req.show_time),
            play: Some(req.play),
            theatre_hall: Some(req.theatre_hall),
        }
    }
}

/// Checks that referenced play and hall exist, returning the hall when one
/// was given.
async fn check_references(
    conn: &mut PgConnection,
    play: Option<i64>,
    theatre_hall: Option<i64>,
) -> AppResult<Option<TheatreHall>> {
    let mut errors = FieldErrors::new();

    if let Some(play_id) = play {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM plays WHERE id = $1)")
            .bind(play_id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            errors.merge(missing_ids(&[play_id], &[], "play"));
        }
    }

    let mut hall = None;
    if let Some(hall_id) = theatre_hall {
        hall = sqlx::query_as::<_, TheatreHall>(
            "SELECT id, name, rows, seats_in_row FROM theatre_halls WHERE id = $1",
        )
        .bind(hall_id)
        .fetch_optional(&mut *conn)
        .await?;
        if hall.is_none() {
            errors.merge(missing_ids(&[hall_id], &[], "theatre_hall"));
        }
    }

    errors.into_result()?;
    Ok(hall)
}

// POST /api/theatre/performances
async fn create_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppJson(req): AppJson<PerformanceRequest>,
) -> AppResult<(StatusCode, Json<Performance>)> {
    let mut conn = state.db.pool.acquire().await?;
    check_references(&mut *conn, Some(req.play), Some(req.theatre_hall)).await?;

    let performance = sqlx::query_as::<_, Performance>(
        "INSERT INTO performances (show_time, play_id, theatre_hall_id) VALUES ($1, $2, $3)
         RETURNING id, show_time, play_id, theatre_hall_id",
    )
    .bind(req.show_time)
    .bind(req.play)
    .bind(req.theatre_hall)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(performance_id = performance.id, "Performance created");
    Ok((StatusCode::CREATED, Json(performance)))
}

// PUT /api/theatre/performances/{id}
async fn replace_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<PerformanceRequest>,
) -> AppResult<Json<Performance>> {
    apply_update(&state, id, req.into()).await.map(Json)
}

// PATCH /api/theatre/performances/{id}
async fn update_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<PerformancePatch>,
) -> AppResult<Json<Performance>> {
    apply_update(&state, id, patch).await.map(Json)
}

async fn apply_update(state: &AppState, id: i64, patch: PerformancePatch) -> AppResult<Performance> {
    let mut tx = state.db.pool.begin().await?;

    // Blocks reservations (FOR SHARE) while the hall may change
    let current = sqlx::query_as::<_, Performance>(
        "SELECT id, show_time, play_id, theatre_hall_id FROM performances WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(AppError::not_found)?;

    let new_hall = patch.theatre_hall.filter(|hall| *hall != current.theatre_hall_id);
    let hall = check_references(&mut *tx, patch.play, new_hall).await?;

    if let Some(hall) = hall {
        let (max_row, max_seat): (i32, i32) = sqlx::query_as(
            "SELECT COALESCE(MAX(row), 0), COALESCE(MAX(seat), 0) FROM tickets WHERE performance_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        hall_fits_sold_seats(&hall, max_row, max_seat)?;
    }

    let performance = sqlx::query_as::<_, Performance>(
        "UPDATE performances
         SET show_time = COALESCE($2, show_time),
             play_id = COALESCE($3, play_id),
             theatre_hall_id = COALESCE($4, theatre_hall_id)
         WHERE id = $1
         RETURNING id, show_time, play_id, theatre_hall_id",
    )
    .bind(id)
    .bind(patch.show_time)
    .bind(patch.play)
    .bind(patch.theatre_hall)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(performance_id = id, "Performance updated");
    Ok(performance)
}

/// A performance may only move to a hall where every sold seat still exists.
fn hall_fits_sold_seats(hall: &TheatreHall, max_row: i32, max_seat: i32) -> Result<(), FieldErrors> {
    if max_row > hall.rows || max_seat > hall.seats_in_row {
        return Err(FieldErrors::single(
            "theatre_hall",
            format!(
                "Theatre hall is too small for the tickets already sold (needs {} rows and {} seats in a row).",
                max_row, max_seat
            ),
        ));
    }
    Ok(())
}

// DELETE /api/theatre/performances/{id}
async fn delete_performance(
    State(state): State<Arc<AppState>>,
    _staff: StaffUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM performances WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found());
    }

    tracing::info!(performance_id = id, "Performance deleted");
    Ok(StatusCode::NO_CONTENT)
}
