//! PostgreSQL access for debt-service.
//!
//! One `Database` wrapper owns the pool; entity operations live in the
//! submodules as further `impl Database` blocks. Every query that touches
//! tenant data takes a [`Scope`] and filters on the owning store.

mod admins;
mod debtors;
mod debts;
mod ledger;
mod likes;
mod payments;
mod sessions;
mod stores;

pub use admins::AdminChanges;
pub use debtors::{DebtorChanges, NewDebtor};
pub use debts::{DebtChanges, NewDebt};
pub use payments::PaymentChanges;
pub use stores::{NewStore, StoreChanges};

use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Which rows a principal may see: everything (admins) or one store's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Store(Uuid),
}

impl Scope {
    /// Bound as `$n::uuid` in `($n::uuid IS NULL OR d.store_id = $n)` filters.
    pub fn store_id(&self) -> Option<Uuid> {
        match self {
            Scope::All => None,
            Scope::Store(id) => Some(*id),
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "debt-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use a lazily connected one).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Failures inside write transactions surface as 400 `Failed to <action>: <cause>`.
pub(crate) fn write_failed(action: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| AppError::BadRequest(anyhow::anyhow!("Failed to {}: {}", action, e))
}

pub(crate) fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", action, e))
}

pub(crate) fn not_found(what: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} with ID {} not found", what, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn scope_binds_store_filter() {
        let id = Uuid::new_v4();
        assert_eq!(Scope::All.store_id(), None);
        assert_eq!(Scope::Store(id).store_id(), Some(id));
    }

    #[test]
    fn write_failures_are_bad_requests() {
        let err = write_failed("create debtor")(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Failed to create debtor"));
    }
}
