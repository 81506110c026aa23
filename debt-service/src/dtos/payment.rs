use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::positive_amount;
use crate::models::PaymentType;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub debt_id: Uuid,
    #[validate(custom(function = "positive_amount"))]
    pub sum: Decimal,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    #[validate(custom(function = "positive_amount"))]
    pub sum: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub payment_type: Option<PaymentType>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentTypeRequest {
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
}

#[derive(Debug, Deserialize)]
pub struct BetweenDatesQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize)]
pub struct DeletedCount {
    pub deleted_count: u64,
}
