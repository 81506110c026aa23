use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A store marking one of its debtors as a favourite.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Like {
    pub id: Uuid,
    pub store_id: Uuid,
    pub debtor_id: Uuid,
    pub created_at: DateTime<Utc>,
}
