//! Reservation transaction: one reservation plus all of its tickets, or
//! nothing at all.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use super::seat_validator;
use super::store::{ReservationStore, ReservationUnit};
use crate::error::{AppError, FieldErrors};
use crate::models::{timestamps, HallDimensions, Reservation, Ticket, TicketRequest};

pub const SEAT_TAKEN_MESSAGE: &str = "The fields performance, row, seat must make a unique set.";
const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    PerformanceNotFound(i64),
    OutOfRange(FieldErrors),
    SeatTaken,
}

impl TicketError {
    pub fn to_field_errors(&self) -> FieldErrors {
        match self {
            TicketError::PerformanceNotFound(id) => FieldErrors::single(
                "performance",
                format!("Invalid pk \"{id}\" - object does not exist."),
            ),
            TicketError::OutOfRange(fields) => fields.clone(),
            TicketError::SeatTaken => FieldErrors::single(NON_FIELD_ERRORS, SEAT_TAKEN_MESSAGE),
        }
    }
}

/// A rejected ticket and its position in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketFailure {
    pub index: usize,
    pub error: TicketError,
}

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("a reservation needs at least one ticket")]
    NoTickets,

    #[error("{} of {ticket_count} tickets rejected", failures.len())]
    Rejected {
        ticket_count: usize,
        failures: Vec<TicketFailure>,
    },

    #[error("reservation storage failed")]
    Store(#[from] sqlx::Error),
}

impl ReservationError {
    pub fn failures(&self) -> &[TicketFailure] {
        match self {
            ReservationError::Rejected { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::NoTickets => {
                AppError::Validation(json!({ "tickets": ["This list may not be empty."] }))
            }
            ReservationError::Rejected {
                ticket_count,
                failures,
            } => {
                // One object per requested ticket, empty when that ticket was fine
                let mut per_ticket = vec![Value::Object(Map::new()); ticket_count];
                for failure in failures {
                    if let Some(slot) = per_ticket.get_mut(failure.index) {
                        *slot = json!(failure.error.to_field_errors());
                    }
                }
                AppError::Validation(json!({ "tickets": per_ticket }))
            }
            ReservationError::Store(e) => AppError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatedReservation {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub tickets: Vec<Ticket>,
}

/// Attempts per request when Postgres aborts the unit with a deadlock or
/// serialization failure.
const MAX_ATTEMPTS: u32 = 3;

/// Creates a reservation for `user_id` holding one ticket per request.
///
/// Every request is checked, so all failing tickets are reported together.
/// If any fails, the unit of work is rolled back and nothing persists.
pub async fn create_reservation<S>(
    store: &S,
    user_id: i64,
    requests: &[TicketRequest],
) -> Result<CreatedReservation, ReservationError>
where
    S: ReservationStore,
{
    if requests.is_empty() {
        return Err(ReservationError::NoTickets);
    }

    let mut attempt = 1;
    loop {
        match attempt_reservation(store, user_id, requests).await {
            Err(ReservationError::Store(e)) if is_transient(&e) && attempt < MAX_ATTEMPTS => {
                warn!(user_id, attempt, error = %e, "Reservation aborted by the database, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

async fn attempt_reservation<S>(
    store: &S,
    user_id: i64,
    requests: &[TicketRequest],
) -> Result<CreatedReservation, ReservationError>
where
    S: ReservationStore,
{
    let mut unit = store.begin().await?;

    let reservation = match unit.insert_reservation(user_id, timestamps::now()).await {
        Ok(reservation) => reservation,
        Err(e) => {
            discard(unit, None, user_id).await;
            return Err(ReservationError::Store(e));
        }
    };
    let reservation_id = reservation.id;

    match book_tickets(&mut unit, reservation.id, requests).await {
        Ok(Ok(tickets)) => {
            unit.commit().await?;
            info!(
                reservation_id,
                user_id,
                tickets = tickets.len(),
                "Reservation created"
            );
            Ok(CreatedReservation {
                reservation,
                tickets,
            })
        }
        Ok(Err(failures)) => {
            unit.rollback().await?;
            warn!(
                user_id,
                requested = requests.len(),
                rejected = failures.len(),
                "Reservation rejected"
            );
            Err(ReservationError::Rejected {
                ticket_count: requests.len(),
                failures,
            })
        }
        Err(e) => {
            warn!(reservation_id, user_id, error = %e, "Reservation failed in storage");
            discard(unit, Some(reservation_id), user_id).await;
            Err(ReservationError::Store(e))
        }
    }
}

async fn discard<U: ReservationUnit>(unit: U, reservation_id: Option<i64>, user_id: i64) {
    if let Err(e) = unit.rollback().await {
        warn!(?reservation_id, user_id, error = ?e, "Rollback after storage failure also failed");
    }
}

/// Deadlock (`40P01`) and serialization failure (`40001`): the whole unit can
/// be run again.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40P01" | "40001")),
        _ => false,
    }
}

/// Claims every requested seat, returning the tickets in request order or
/// every failure found.
///
/// Seats are claimed in `(performance, row, seat)` order, so two units asking
/// for overlapping seats always contend for them in the same order and the
/// later one waits instead of deadlocking.
async fn book_tickets<U>(
    unit: &mut U,
    reservation_id: i64,
    requests: &[TicketRequest],
) -> Result<Result<Vec<Ticket>, Vec<TicketFailure>>, sqlx::Error>
where
    U: ReservationUnit,
{
    let mut order: Vec<(usize, &TicketRequest)> = requests.iter().enumerate().collect();
    // Stable: within a batch, the earlier duplicate keeps the seat
    order.sort_by_key(|(_, r)| (r.performance_id, r.row, r.seat));

    let mut halls: HashMap<i64, Option<HallDimensions>> = HashMap::new();
    let mut tickets = Vec::with_capacity(requests.len());
    let mut failures = Vec::new();

    for (index, request) in order {
        let hall = match halls.get(&request.performance_id) {
            Some(hall) => *hall,
            None => {
                let hall = unit.hall_for_performance(request.performance_id).await?;
                halls.insert(request.performance_id, hall);
                hall
            }
        };

        let Some(hall) = hall else {
            failures.push(TicketFailure {
                index,
                error: TicketError::PerformanceNotFound(request.performance_id),
            });
            continue;
        };

        if let Err(fields) = seat_validator::validate(request.row, request.seat, hall) {
            failures.push(TicketFailure {
                index,
                error: TicketError::OutOfRange(fields),
            });
            continue;
        }

        match unit.insert_ticket(reservation_id, request).await? {
            Some(ticket) => tickets.push((index, ticket)),
            None => failures.push(TicketFailure {
                index,
                error: TicketError::SeatTaken,
            }),
        }
    }

    if failures.is_empty() {
        tickets.sort_by_key(|(index, _)| *index);
        Ok(Ok(tickets.into_iter().map(|(_, ticket)| ticket).collect()))
    } else {
        failures.sort_by_key(|failure| failure.index);
        Ok(Err(failures))
    }
}
