use axum::extract::{Multipart, State};
use service_core::error::AppError;
use uuid::Uuid;

use super::{discard_files, store_uploaded_image};
use crate::{
    dtos::{
        debt::{CreateDebtRequest, UpdateDebtRequest},
        ApiResponse, PageQuery,
    },
    middleware::AuthUser,
    models::{Debt, DebtImage},
    services::{DebtChanges, NewDebt},
    utils::{ValidatedJson, ValidatedPath, ValidatedQuery},
    AppState,
};

const FOLDER: &str = "debts";

pub async fn create_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateDebtRequest>,
) -> Result<ApiResponse<Debt>, AppError> {
    let month_sum = req.installment();
    let debt = state
        .db
        .create_debt(
            principal.scope(),
            &NewDebt {
                debtor_id: req.debtor_id,
                debt_sum: req.debt_sum,
                month_sum,
                debt_period: req.debt_period,
                debt_date: req.debt_date,
                description: req.description,
            },
        )
        .await?;
    Ok(ApiResponse::created(debt))
}

pub async fn list_debts(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<ApiResponse<Vec<Debt>>, AppError> {
    let debts = state.db.list_debts(principal.scope()).await?;
    let total = debts.len() as i64;
    Ok(ApiResponse::paged(debts, total))
}

pub async fn list_debts_page(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Debt>>, AppError> {
    let (debts, total) = state
        .db
        .list_debts_page(principal.scope(), page.limit() as i64, page.offset())
        .await?;
    Ok(ApiResponse::paged(debts, total))
}

pub async fn get_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Debt>, AppError> {
    let debt = state.db.get_debt(principal.scope(), id).await?;
    Ok(ApiResponse::ok(debt))
}

pub async fn update_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateDebtRequest>,
) -> Result<ApiResponse<Debt>, AppError> {
    let debt = state
        .db
        .update_debt(
            principal.scope(),
            id,
            DebtChanges {
                debt_sum: req.debt_sum,
                month_sum: req.month_sum,
                debt_period: req.debt_period,
                debt_date: req.debt_date,
                description: req.description,
            },
        )
        .await?;
    Ok(ApiResponse::ok(debt))
}

pub async fn delete_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    let images = state.db.delete_debt(principal.scope(), id).await?;
    discard_files(&state, &images).await;
    Ok(ApiResponse::message("Debt deleted"))
}

pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    multipart: Multipart,
) -> Result<ApiResponse<DebtImage>, AppError> {
    let scope = principal.scope();
    state.db.get_debt(scope, id).await?;

    let key = store_uploaded_image(&state, multipart, FOLDER).await?;

    match state.db.add_debt_image(scope, id, &key).await {
        Ok(image) => Ok(ApiResponse::created(image)),
        Err(e) => {
            discard_files(&state, std::slice::from_ref(&key)).await;
            Err(e)
        }
    }
}

pub async fn list_images(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Vec<DebtImage>>, AppError> {
    let images = state.db.list_debt_images(principal.scope(), id).await?;
    Ok(ApiResponse::ok(images))
}
