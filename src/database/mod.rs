pub mod error;
pub mod memory;
pub mod repository;
pub mod transaction;
#[cfg(feature = "database")]
pub mod transaction_repository;

#[cfg(feature = "database")]
pub use pool::*;

#[cfg(feature = "database")]
mod pool {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use std::time::Duration;
    use tracing::{error as log_error, info, warn};

    use super::error::{DatabaseError, DatabaseErrorKind};
    use crate::config::DatabaseConfig;

    /// Open the pool described by `config` and make sure one connection works.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connection_timeout_secs = config.connection_timeout,
            idle_timeout_secs = ?config.idle_timeout,
            "Opening transaction store pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .idle_timeout(config.idle_timeout.map(Duration::from_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                log_error!(error = %e, "Could not open transaction store pool");
                DatabaseError::from_sqlx(e)
            })?;

        ping(&pool).await?;
        Ok(pool)
    }

    /// Apply the embedded `migrations/` directory.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| {
                log_error!(error = %e, "Transaction store migration failed");
                DatabaseError::new(DatabaseErrorKind::QueryError {
                    message: format!("migration failed: {}", e),
                })
            })?;
        info!("Transaction store migrations applied");
        Ok(())
    }

    pub async fn ping(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
            warn!(error = %e, "Transaction store ping failed");
            DatabaseError::from_sqlx(e)
        })?;
        Ok(())
    }

}
