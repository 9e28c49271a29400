use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::error::{DatabaseError, ErrorKind};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ReservationStore, ReservationUnit};
use crate::models::{HallDimensions, Reservation, Ticket, TicketRequest};

#[derive(Default)]
struct MemoryState {
    halls: HashMap<i64, HallDimensions>,
    reservations: Vec<Reservation>,
    tickets: Vec<Ticket>,
    next_id: i64,
    deadlocks: usize,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store used by unit tests. Units are fully serialized by holding the state
/// lock from `begin` until commit or rollback.
#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_performance(&self, performance_id: i64, hall: HallDimensions) {
        self.state.lock().await.halls.insert(performance_id, hall);
    }

    /// Books a seat outside of any request, as an earlier reservation would.
    pub async fn seed_ticket(&self, user_id: i64, performance_id: i64, row: i32, seat: i32) {
        let mut state = self.state.lock().await;
        let reservation_id = state.next_id();
        state.reservations.push(Reservation {
            id: reservation_id,
            created_at: crate::models::timestamps::now(),
            user_id,
        });
        let ticket_id = state.next_id();
        state.tickets.push(Ticket {
            id: ticket_id,
            row,
            seat,
            performance_id,
            reservation_id,
        });
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }

    /// The next `count` ticket inserts fail the way a Postgres deadlock does.
    pub async fn fail_with_deadlocks(&self, count: usize) {
        self.state.lock().await.deadlocks = count;
    }
}

/// Stand-in for the error Postgres raises when it aborts a deadlocked unit.
#[derive(Debug, thiserror::Error)]
#[error("deadlock detected")]
pub struct Deadlock;

impl DatabaseError for Deadlock {
    fn message(&self) -> &str {
        "deadlock detected"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("40P01"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct MemoryReservationUnit {
    state: OwnedMutexGuard<MemoryState>,
    reservations: Vec<Reservation>,
    tickets: Vec<Ticket>,
}

impl MemoryReservationUnit {
    fn is_taken(&self, request: &TicketRequest) -> bool {
        self.state.tickets.iter().chain(self.tickets.iter()).any(|t| {
            t.performance_id == request.performance_id
                && t.row == request.row
                && t.seat == request.seat
        })
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    type Unit = MemoryReservationUnit;

    async fn begin(&self) -> Result<Self::Unit, sqlx::Error> {
        let state = Arc::clone(&self.state).lock_owned().await;
        Ok(MemoryReservationUnit {
            state,
            reservations: Vec::new(),
            tickets: Vec::new(),
        })
    }
}

#[async_trait]
impl ReservationUnit for MemoryReservationUnit {
    async fn insert_reservation(
        &mut self,
        user_id: i64,
        created_at: NaiveDateTime,
    ) -> Result<Reservation, sqlx::Error> {
        let reservation = Reservation {
            id: self.state.next_id(),
            created_at,
            user_id,
        };
        self.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn hall_for_performance(
        &mut self,
        performance_id: i64,
    ) -> Result<Option<HallDimensions>, sqlx::Error> {
        Ok(self.state.halls.get(&performance_id).copied())
    }

    async fn insert_ticket(
        &mut self,
        reservation_id: i64,
        request: &TicketRequest,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        if self.state.deadlocks > 0 {
            self.state.deadlocks -= 1;
            return Err(sqlx::Error::Database(Box::new(Deadlock)));
        }
        if self.is_taken(request) {
            return Ok(None);
        }
        let ticket = Ticket {
            id: self.state.next_id(),
            row: request.row,
            seat: request.seat,
            performance_id: request.performance_id,
            reservation_id,
        };
        self.tickets.push(ticket.clone());
        Ok(Some(ticket))
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        let MemoryReservationUnit {
            mut state,
            reservations,
            tickets,
        } = self;
        state.reservations.extend(reservations);
        state.tickets.extend(tickets);
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}
