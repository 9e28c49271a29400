use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Transaction};

use super::{ReservationStore, ReservationUnit};
use crate::models::{HallDimensions, Reservation, Ticket, TicketRequest};

#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgReservationUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    type Unit = PgReservationUnit;

    async fn begin(&self) -> Result<Self::Unit, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(PgReservationUnit { tx })
    }
}

#[async_trait]
impl ReservationUnit for PgReservationUnit {
    async fn insert_reservation(
        &mut self,
        user_id: i64,
        created_at: NaiveDateTime,
    ) -> Result<Reservation, sqlx::Error> {
        sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations (created_at, user_id)
             VALUES ($1, $2)
             RETURNING id, created_at, user_id",
        )
        .bind(created_at)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn hall_for_performance(
        &mut self,
        performance_id: i64,
    ) -> Result<Option<HallDimensions>, sqlx::Error> {
        // FOR SHARE keeps the performance from being moved to another hall
        // until this transaction ends.
        sqlx::query_as::<_, HallDimensions>(
            "SELECT h.rows, h.seats_in_row
             FROM performances p
             JOIN theatre_halls h ON h.id = p.theatre_hall_id
             WHERE p.id = $1
             FOR SHARE OF p",
        )
        .bind(performance_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn insert_ticket(
        &mut self,
        reservation_id: i64,
        request: &TicketRequest,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        // A concurrent uncommitted insert of the same seat makes this wait for
        // that transaction; if it commits, nothing is inserted here.
        sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (performance_id, reservation_id, row, seat)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (performance_id, row, seat) DO NOTHING
             RETURNING id, row, seat, performance_id, reservation_id",
        )
        .bind(request.performance_id)
        .bind(reservation_id)
        .bind(request.row)
        .bind(request.seat)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
