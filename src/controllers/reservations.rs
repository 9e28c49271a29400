use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::middleware::AuthUser;
use crate::models::{timestamps, Reservation, TicketRequest};
use crate::services::reservation::{create_reservation, CreatedReservation};
use crate::AppState;

const PATH: &str = "/api/theatre/reservations";
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/reservations", get(list_reservations).post(book))
}

/* ---------- PAGINATION ---------- */

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageRequest {
    page: i64,
    size: i64,
}

impl PageRequest {
    /// Unparseable sizes fall back to the default, oversized ones are capped.
    /// Pages must be positive integers or `"last"`; the latter is resolved
    /// once the total is known.
    fn from_query(query: &PageQuery) -> Result<(Option<i64>, i64), AppError> {
        let size = query
            .page_size
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|size| *size > 0)
            .map_or(DEFAULT_PAGE_SIZE, |size| size.min(MAX_PAGE_SIZE));

        let page = match query.page.as_deref().map(str::trim) {
            None | Some("") => Some(1),
            Some("last") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(page) if page > 0 => Some(page),
                _ => return Err(invalid_page()),
            },
        };

        Ok((page, size))
    }

    fn resolve(page: Option<i64>, size: i64, count: i64) -> Result<Self, AppError> {
        // An empty result set still has one (empty) page
        let pages = ((count + size - 1) / size).max(1);
        let page = page.unwrap_or(pages);
        if page > pages {
            return Err(invalid_page());
        }
        Ok(Self { page, size })
    }

    fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }

    fn link(&self, page: i64) -> String {
        let mut params = vec![("page", page.to_string())];
        if self.size != DEFAULT_PAGE_SIZE {
            params.push(("page_size", self.size.to_string()));
        }
        match serde_urlencoded::to_string(&params) {
            Ok(query) => format!("{PATH}?{query}"),
            Err(_) => PATH.to_string(),
        }
    }

    fn next(&self, count: i64) -> Option<String> {
        (self.page * self.size < count).then(|| self.link(self.page + 1))
    }

    fn previous(&self) -> Option<String> {
        (self.page > 1).then(|| self.link(self.page - 1))
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/* ---------- LIST ---------- */

#[derive(Debug, Serialize)]
pub struct PerformanceSummary {
    pub id: i64,
    #[serde(with = "timestamps::utc_naive")]
    pub show_time: NaiveDateTime,
    pub play_title: String,
    pub theatre_hall_name: String,
}

#[derive(Debug, Serialize)]
pub struct TicketItem {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub performance: PerformanceSummary,
}

#[derive(Debug, Serialize)]
pub struct ReservationItem {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub tickets: Vec<TicketItem>,
}

#[derive(Debug, FromRow)]
struct TicketRow {
    id: i64,
    row: i32,
    seat: i32,
    reservation_id: i64,
    performance_id: i64,
    show_time: NaiveDateTime,
    play_title: String,
    theatre_hall_name: String,
}

impl From<TicketRow> for TicketItem {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            row: row.row,
            seat: row.seat,
            performance: PerformanceSummary {
                id: row.performance_id,
                show_time: row.show_time,
                play_title: row.play_title,
                theatre_hall_name: row.theatre_hall_name,
            },
        }
    }
}

// GET /api/theatre/reservations?page=2&page_size=20
async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<Page<ReservationItem>>> {
    let (page, size) = PageRequest::from_query(&query)?;
    let pool = &state.db.pool;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;
    let page = PageRequest::resolve(page, size, count)?;

    let reservations = sqlx::query_as::<_, Reservation>(
        "SELECT id, created_at, user_id FROM reservations
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let ids: Vec<i64> = reservations.iter().map(|r| r.id).collect();
    let rows = sqlx::query_as::<_, TicketRow>(
        "SELECT t.id, t.row, t.seat, t.reservation_id,
                p.id AS performance_id, p.show_time,
                pl.title AS play_title, h.name AS theatre_hall_name
         FROM tickets t
         JOIN performances p ON p.id = t.performance_id
         JOIN plays pl ON pl.id = p.play_id
         JOIN theatre_halls h ON h.id = p.theatre_hall_id
         WHERE t.reservation_id = ANY($1)
         ORDER BY t.row, t.seat, t.id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_reservation: HashMap<i64, Vec<TicketItem>> = HashMap::new();
    for row in rows {
        by_reservation.entry(row.reservation_id).or_default().push(row.into());
    }

    let results = reservations
        .into_iter()
        .map(|reservation| ReservationItem {
            tickets: by_reservation.remove(&reservation.id).unwrap_or_default(),
            reservation,
        })
        .collect();

    Ok(Json(Page {
        count,
        next: page.next(count),
        previous: page.previous(),
        results,
    }))
}

/* ---------- CREATE ---------- */

#[derive(Debug, Deserialize)]
struct ReservationRequest {
    #[serde(default)]
    tickets: Vec<TicketRequest>,
}

// POST /api/theatre/reservations
async fn book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<ReservationRequest>,
) -> AppResult<(StatusCode, Json<CreatedReservation>)> {
    let created = create_reservation(&state.reservations, user.user_id, &req.tickets).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
