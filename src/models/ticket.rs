use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    #[serde(rename = "performance")]
    pub performance_id: i64,
    #[serde(skip_serializing)]
    pub reservation_id: i64,
}

/// One seat asked for in a reservation request.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct TicketRequest {
    pub row: i32,
    pub seat: i32,
    #[serde(rename = "performance")]
    pub performance_id: i64,
}

#[derive(Debug, Clone, Copy, FromRow, Serialize, PartialEq, Eq, Hash)]
pub struct SeatPosition {
    pub row: i32,
    pub seat: i32,
}
