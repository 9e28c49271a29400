pub mod actors;
pub mod genres;
pub mod performances;
pub mod plays;
pub mod reservations;
pub mod theatre_halls;
pub mod users;

use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, FieldErrors};

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .nest("/theatre", theatre_routes())
        .nest("/user", users::routes())
}

fn theatre_routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(genres::routes())
        .merge(actors::routes())
        .merge(theatre_halls::routes())
        .merge(plays::routes())
        .merge(performances::routes())
        .merge(reservations::routes())
}

/* ---------- helpers ---------- */

/// Parses `"1,2,3"` query values into ids.
pub(crate) fn parse_id_list(raw: &str, field: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                AppError::from(FieldErrors::single(field, format!("\"{part}\" is not a valid id.")))
            })
        })
        .collect()
}

/// Maps a unique-constraint violation to a field error, anything else to a
/// database error.
pub(crate) fn unique_violation(err: sqlx::Error, field: &str, message: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            FieldErrors::single(field, message).into()
        }
        other => AppError::from(other),
    }
}

/// Ids from `requested` that are not in `found`, for "does not exist" errors.
pub(crate) fn missing_ids(requested: &[i64], found: &[i64], field: &str) -> FieldErrors {
    let found: HashSet<i64> = found.iter().copied().collect();
    let mut errors = FieldErrors::new();
    for id in requested {
        if !found.contains(id) {
            errors.add(field, format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    errors
}
