use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A principal obligation paid back in `debt_period` monthly installments
/// of `month_sum`, starting in the month of `debt_date`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Debt {
    pub id: Uuid,
    pub debtor_id: Uuid,
    pub debt_sum: Decimal,
    pub month_sum: Decimal,
    pub debt_period: i32,
    pub debt_date: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DebtImage {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub image: String,
    pub created_at: DateTime<Utc>,
}
