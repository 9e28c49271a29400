//! Storage seam for the reservation transaction.
//!
//! A [`ReservationStore`] hands out one [`ReservationUnit`] per request. Work
//! done through a unit becomes visible to others only after `commit`; dropping
//! the unit or calling `rollback` discards all of it.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::{HallDimensions, Reservation, Ticket, TicketRequest};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgReservationStore;

#[async_trait]
pub trait ReservationStore: Send + Sync {
    type Unit: ReservationUnit;

    async fn begin(&self) -> Result<Self::Unit, sqlx::Error>;
}

#[async_trait]
pub trait ReservationUnit: Send {
    async fn insert_reservation(
        &mut self,
        user_id: i64,
        created_at: NaiveDateTime,
    ) -> Result<Reservation, sqlx::Error>;

    /// Dimensions of the hall the performance plays in, `None` if there is no
    /// such performance.
    async fn hall_for_performance(
        &mut self,
        performance_id: i64,
    ) -> Result<Option<HallDimensions>, sqlx::Error>;

    /// Claims the seat for the reservation. `None` means the seat of that
    /// performance is already taken.
    async fn insert_ticket(
        &mut self,
        reservation_id: i64,
        request: &TicketRequest,
    ) -> Result<Option<Ticket>, sqlx::Error>;

    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}
