//! Reservation transaction against Postgres: each test gets a fresh migrated
//! database from `sqlx::test` (needs `DATABASE_URL`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sqlx::PgPool;

use theatre_api::models::TicketRequest;
use theatre_api::services::reservation::{create_reservation, ReservationError, TicketError};
use theatre_api::services::store::PgReservationStore;

struct Fixture {
    user_id: i64,
    performance_id: i64,
}

async fn seed(pool: &PgPool, rows: i32, seats_in_row: i32) -> sqlx::Result<Fixture> {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, date_joined)
         VALUES ('viewer@theatre.test', 'x', NOW()) RETURNING id",
    )
    .fetch_one(pool)
    .await?;
    let hall_id: i64 = sqlx::query_scalar(
        "INSERT INTO theatre_halls (name, rows, seats_in_row) VALUES ('Blue', $1, $2) RETURNING id",
    )
    .bind(rows)
    .bind(seats_in_row)
    .fetch_one(pool)
    .await?;
    let play_id: i64 = sqlx::query_scalar("INSERT INTO plays (title) VALUES ('Hamlet') RETURNING id")
        .fetch_one(pool)
        .await?;
    let performance_id: i64 = sqlx::query_scalar(
        "INSERT INTO performances (show_time, play_id, theatre_hall_id)
         VALUES (NOW(), $1, $2) RETURNING id",
    )
    .bind(play_id)
    .bind(hall_id)
    .fetch_one(pool)
    .await?;

    Ok(Fixture { user_id, performance_id })
}

fn seat(fixture: &Fixture, row: i32, seat: i32) -> TicketRequest {
    TicketRequest { row, seat, performance_id: fixture.performance_id }
}

async fn counts(pool: &PgPool) -> sqlx::Result<(i64, i64)> {
    let reservations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
        .fetch_one(pool)
        .await?;
    let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets").fetch_one(pool).await?;
    Ok((reservations, tickets))
}

fn assert_all_seats_taken(err: &ReservationError) {
    assert!(
        matches!(err, ReservationError::Rejected { .. }),
        "expected a rejected reservation, got {err:?}"
    );
    assert!(err.failures().iter().all(|f| f.error == TicketError::SeatTaken));
}

#[sqlx::test(migrations = "./src/migrations")]
async fn booked_seat_cannot_be_booked_again(pool: PgPool) -> sqlx::Result<()> {
    let fixture = seed(&pool, 5, 5).await?;
    let store = PgReservationStore::new(pool.clone());

    let created = create_reservation(&store, fixture.user_id, &[seat(&fixture, 1, 2), seat(&fixture, 1, 3)])
        .await
        .unwrap();
    assert_eq!(created.tickets.len(), 2);

    let err = create_reservation(&store, fixture.user_id, &[seat(&fixture, 1, 2)])
        .await
        .unwrap_err();
    assert_all_seats_taken(&err);
    assert_eq!(err.failures()[0].index, 0);

    assert_eq!(counts(&pool).await?, (1, 2));
    Ok(())
}

#[sqlx::test(migrations = "./src/migrations")]
async fn rejected_batch_leaves_nothing_behind(pool: PgPool) -> sqlx::Result<()> {
    let fixture = seed(&pool, 5, 5).await?;
    let store = PgReservationStore::new(pool.clone());

    let err = create_reservation(
        &store,
        fixture.user_id,
        &[seat(&fixture, 1, 1), seat(&fixture, 9, 9), seat(&fixture, 2, 2)],
    )
    .await
    .unwrap_err();

    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].index, 1);
    assert_eq!(counts(&pool).await?, (0, 0));

    // The seats of the rolled back batch are still free
    create_reservation(&store, fixture.user_id, &[seat(&fixture, 1, 1)])
        .await
        .unwrap();
    Ok(())
}

#[sqlx::test(migrations = "./src/migrations")]
async fn unknown_performance_is_a_ticket_error(pool: PgPool) -> sqlx::Result<()> {
    let fixture = seed(&pool, 5, 5).await?;
    let store = PgReservationStore::new(pool.clone());
    let missing = TicketRequest { row: 1, seat: 1, performance_id: fixture.performance_id + 100 };

    let err = create_reservation(&store, fixture.user_id, &[missing]).await.unwrap_err();

    assert_eq!(
        err.failures()[0].error,
        TicketError::PerformanceNotFound(fixture.performance_id + 100)
    );
    Ok(())
}

#[sqlx::test(migrations = "./src/migrations")]
async fn concurrent_bookings_of_one_seat_have_one_winner(pool: PgPool) -> sqlx::Result<()> {
    let fixture = seed(&pool, 5, 5).await?;
    let store = PgReservationStore::new(pool.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let requests = [seat(&fixture, 3, 3)];
            let user_id = fixture.user_id;
            tokio::spawn(async move { create_reservation(&store, user_id, &requests).await })
        })
        .collect();

    let mut winners = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert_all_seats_taken(&err),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(counts(&pool).await?, (1, 1));
    Ok(())
}

#[sqlx::test(migrations = "./src/migrations")]
async fn cross_ordered_batches_never_fail_in_storage(pool: PgPool) -> sqlx::Result<()> {
    const ROUNDS: i32 = 30;
    let fixture = seed(&pool, ROUNDS, 2).await?;
    let store = PgReservationStore::new(pool.clone());

    for row in 1..=ROUNDS {
        let forward = [seat(&fixture, row, 1), seat(&fixture, row, 2)];
        let backward = [seat(&fixture, row, 2), seat(&fixture, row, 1)];

        let first = {
            let store = store.clone();
            let user_id = fixture.user_id;
            tokio::spawn(async move { create_reservation(&store, user_id, &forward).await })
        };
        let second = {
            let store = store.clone();
            let user_id = fixture.user_id;
            tokio::spawn(async move { create_reservation(&store, user_id, &backward).await })
        };

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(winners, 1, "row {row}");
        for outcome in &outcomes {
            if let Err(err) = outcome {
                assert_all_seats_taken(err);
                assert_eq!(err.failures().len(), 2, "row {row}");
            }
        }
    }

    assert_eq!(counts(&pool).await?, (i64::from(ROUNDS), i64::from(ROUNDS) * 2));
    Ok(())
}
