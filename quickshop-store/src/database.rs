use quickshop_core::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Postgres unique_violation and serialization_failure.
const CONFLICT_CODES: [&str; 2] = ["23505", "40001"];

pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db)
            if db.code().map_or(false, |c| CONFLICT_CODES.contains(&c.as_ref())) =>
        {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::backend(other),
    }
}

pub(crate) fn parse_id(id: &str) -> Result<i64, StoreError> {
    id.parse().map_err(|_| StoreError::NotFound)
}
