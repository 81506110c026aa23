use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::non_negative_amount;

#[derive(Debug, Deserialize, Validate)]
pub struct StoreSignInRequest {
    #[validate(length(min = 1, max = 64))]
    pub login: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoreRequest {
    #[validate(length(min = 3, max = 64))]
    pub login: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: String,
    #[validate(email)]
    pub email: Option<String>,
    pub image: Option<String>,
    #[validate(custom(function = "non_negative_amount"))]
    pub wallet: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStoreRequest {
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    #[validate(length(min = 7, max = 32))]
    pub phone_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub image: Option<String>,
    #[validate(custom(function = "non_negative_amount"))]
    pub wallet: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPasscodeRequest {
    #[validate(custom(function = "four_digits"))]
    pub passcode: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LikeRequest {
    pub debtor_id: Uuid,
}

/// `?date=YYYY-MM-DD`; defaults to today.
#[derive(Debug, Deserialize)]
pub struct DuePaymentsQuery {
    pub date: Option<NaiveDate>,
}

fn four_digits(value: &str) -> Result<(), ValidationError> {
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("passcode_must_be_4_digits"))
    }
}
