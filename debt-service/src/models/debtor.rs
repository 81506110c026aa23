use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Debtor {
    pub id: Uuid,
    pub store_id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub image: Option<String>,
    pub address: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DebtorImage {
    pub id: Uuid,
    pub debtor_id: Uuid,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Extra phone number of a debtor, unique across all extra numbers.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DebtorPhone {
    pub id: Uuid,
    pub debtor_id: Uuid,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
