use axum::extract::State;
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        payment::{
            BetweenDatesQuery, CreatePaymentRequest, DeletedCount, UpdatePaymentRequest,
            UpdatePaymentTypeRequest,
        },
        ApiResponse, PageQuery,
    },
    middleware::AuthUser,
    models::{Payment, PaymentType},
    services::{PaymentChanges, ServiceError},
    utils::{ValidatedJson, ValidatedPath, ValidatedQuery},
    AppState,
};

pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreatePaymentRequest>,
) -> Result<ApiResponse<Payment>, AppError> {
    let payment = state
        .db
        .create_payment(
            principal.scope(),
            req.debt_id,
            req.sum,
            req.date.unwrap_or_else(Utc::now),
            req.payment_type,
        )
        .await?;
    Ok(ApiResponse::created(payment))
}

pub async fn list_payments(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Payment>>, AppError> {
    let (payments, total) = state
        .db
        .list_payments(principal.scope(), page.limit() as i64, page.offset())
        .await?;
    Ok(ApiResponse::paged(payments, total))
}

pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Payment>, AppError> {
    let payment = state.db.get_payment(principal.scope(), id).await?;
    Ok(ApiResponse::ok(payment))
}

pub async fn update_payment(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePaymentRequest>,
) -> Result<ApiResponse<Payment>, AppError> {
    let payment = state
        .db
        .update_payment(
            principal.scope(),
            id,
            PaymentChanges {
                sum: req.sum,
                date: req.date,
                payment_type: req.payment_type,
            },
        )
        .await?;
    Ok(ApiResponse::ok(payment))
}

pub async fn update_payment_type(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePaymentTypeRequest>,
) -> Result<ApiResponse<Payment>, AppError> {
    let payment = state
        .db
        .update_payment_type(principal.scope(), id, req.payment_type)
        .await?;
    Ok(ApiResponse::ok(payment))
}

pub async fn list_by_type(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(payment_type): ValidatedPath<String>,
) -> Result<ApiResponse<Vec<Payment>>, AppError> {
    let payment_type: PaymentType = payment_type
        .parse()
        .map_err(ServiceError::ValidationError)?;
    let payments = state
        .db
        .list_payments_by_type(principal.scope(), payment_type)
        .await?;
    let total = payments.len() as i64;
    Ok(ApiResponse::paged(payments, total))
}

pub async fn list_by_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(debt_id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Vec<Payment>>, AppError> {
    let payments = state
        .db
        .list_payments_by_debt(principal.scope(), debt_id)
        .await?;
    Ok(ApiResponse::ok(payments))
}

pub async fn delete_by_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(debt_id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<DeletedCount>, AppError> {
    let deleted_count = state
        .db
        .delete_payments_by_debt(principal.scope(), debt_id)
        .await?;
    Ok(ApiResponse::ok(DeletedCount { deleted_count }))
}

pub async fn list_between(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedQuery(range): ValidatedQuery<BetweenDatesQuery>,
) -> Result<ApiResponse<Vec<Payment>>, AppError> {
    if range.start_date > range.end_date {
        return Err(ServiceError::ValidationError(
            "start_date must not be after end_date".to_string(),
        )
        .into());
    }

    let payments = state
        .db
        .list_payments_between(principal.scope(), range.start_date, range.end_date)
        .await?;
    let total = payments.len() as i64;
    Ok(ApiResponse::paged(payments, total))
}
