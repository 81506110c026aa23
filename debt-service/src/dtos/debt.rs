use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{non_negative_amount, positive_amount};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDebtRequest {
    pub debtor_id: Uuid,
    #[validate(custom(function = "positive_amount"))]
    pub debt_sum: Decimal,
    #[validate(custom(function = "non_negative_amount"))]
    pub month_sum: Option<Decimal>,
    #[validate(range(min = 1, max = 600))]
    pub debt_period: i32,
    pub debt_date: DateTime<Utc>,
    pub description: Option<String>,
}

impl CreateDebtRequest {
    /// Installment to store: the explicit one, or the principal split evenly
    /// over the period and rounded to cents.
    pub fn installment(&self) -> Decimal {
        self.month_sum.unwrap_or_else(|| {
            (self.debt_sum / Decimal::from(self.debt_period.max(1)))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDebtRequest {
    #[validate(custom(function = "positive_amount"))]
    pub debt_sum: Option<Decimal>,
    #[validate(custom(function = "non_negative_amount"))]
    pub month_sum: Option<Decimal>,
    #[validate(range(min = 1, max = 600))]
    pub debt_period: Option<i32>,
    pub debt_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}
