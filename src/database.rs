use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

/// Postgres pool shared by every handler.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

fn pool_options(pool_size: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
}

impl Database {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = pool_options(pool_size).connect(database_url).await?;
        info!(pool_size, "Database pool ready");
        Ok(Self { pool })
    }

    /// Pool that opens connections on first use.
    pub fn lazy(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = pool_options(pool_size).connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Schema is up to date");
        Ok(())
    }
}
