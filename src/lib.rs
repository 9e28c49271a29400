pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use services::auth::TokenService;
use services::store::PgReservationStore;
use services::throttle::ThrottleService;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub reservations: PgReservationStore,
    pub tokens: TokenService,
    pub throttle: Option<ThrottleService>,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database.url, config.database.pool_size).await?;
        db.migrate().await?;

        let throttle = match (&config.redis.url, config.features.enable_rate_limiting) {
            (Some(url), true) => Some(ThrottleService::connect(url, &config.throttle).await?),
            _ => {
                info!("Rate limiting disabled");
                None
            }
        };

        Ok(Arc::new(Self::assemble(db, throttle, config)))
    }

    /// State around an existing database handle, without throttling.
    pub fn with_database(db: database::Database, config: config::Config) -> Arc<Self> {
        Arc::new(Self::assemble(db, None, config))
    }

    fn assemble(
        db: database::Database,
        throttle: Option<ThrottleService>,
        config: config::Config,
    ) -> Self {
        Self {
            reservations: PgReservationStore::new(db.pool.clone()),
            tokens: TokenService::from_config(&config.jwt),
            db,
            throttle,
            config,
        }
    }
}

/// The full HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let api = controllers::routes()
        .layer(from_fn_with_state(state.clone(), middleware::throttle::throttle));

    Router::new()
        .route("/", get(|| async { "Theatre API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
