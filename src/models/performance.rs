use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::timestamps;

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Performance {
    pub id: i64,
    #[serde(with = "timestamps::utc_naive")]
    pub show_time: NaiveDateTime,
    #[serde(rename = "play")]
    pub play_id: i64,
    #[serde(rename = "theatre_hall")]
    pub theatre_hall_id: i64,
}
