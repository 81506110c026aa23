use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    OneMonth,
    MultiMonth,
    AnySum,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "one_month",
            Self::MultiMonth => "multi_month",
            Self::AnySum => "any_sum",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_month" => Ok(Self::OneMonth),
            "multi_month" => Ok(Self::MultiMonth),
            "any_sum" => Ok(Self::AnySum),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub sum: Decimal,
    pub date: DateTime<Utc>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub payment_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_matches_column_values() {
        for ty in [PaymentType::OneMonth, PaymentType::MultiMonth, PaymentType::AnySum] {
            assert_eq!(ty.as_str().parse::<PaymentType>().unwrap(), ty);
            assert_eq!(serde_json::to_value(ty).unwrap(), ty.as_str());
        }
        assert!("weekly".parse::<PaymentType>().is_err());
    }
}
