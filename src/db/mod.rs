//! Database connection management

pub mod schema;

use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// PostgreSQL database connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Open one store transaction scope
    pub async fn begin(&self) -> ServiceResult<StoreTx> {
        StoreTx::begin(&self.pool).await
    }
}

/// Scoped store transaction.
///
/// Released exactly once: `commit` or `rollback` consume the handle, and a
/// handle dropped on any other path (early `?` return, panic) is rolled back
/// by sqlx when its connection goes back to the pool.
pub struct StoreTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx {
    pub async fn begin(pool: &PgPool) -> ServiceResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    /// Connection bound to this transaction
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> ServiceResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Explicit rollback. A failure here leaves the transaction state unknown,
    /// which is reported as `ServiceError::Fatal`.
    pub async fn rollback(self) -> ServiceResult<()> {
        self.tx.rollback().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to roll back DB-transaction");
            ServiceError::Fatal(format!("rollback failed: {}", e))
        })
    }
}
