pub mod admin;
pub mod debt;
pub mod debtor;
pub mod payment;
pub mod store;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

pub use service_core::error::ErrorEnvelope as ErrorResponse;

/// Success envelope: `{ status_code, message, data?, total? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, "success", data)
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, "created", data)
    }

    pub fn paged(data: T, total: i64) -> Self {
        Self {
            total: Some(total),
            ..Self::ok(data)
        }
    }

    pub fn with_status(status: StatusCode, message: &str, data: T) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.to_string(),
            data: Some(data),
            total: None,
        }
    }
}

impl ApiResponse<()> {
    /// Envelope without a payload, e.g. for deletions.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
            total: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// `?page=&limit=` with 1-based pages.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.limit() as i64
    }
}

pub(crate) fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive_amount"))
    }
}

pub(crate) fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(ValidationError::new("non_negative_amount"))
    } else {
        Ok(())
    }
}
