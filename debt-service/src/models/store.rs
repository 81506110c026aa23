use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A tenant of the back office. Owns debtors and everything below them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Store {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub wallet: Decimal,
    #[serde(skip_serializing)]
    pub hashed_passcode: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn has_passcode(&self) -> bool {
        self.hashed_passcode.is_some()
    }
}
