use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::timestamps;

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: i64,
    #[serde(with = "timestamps::utc_naive")]
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub user_id: i64,
}
