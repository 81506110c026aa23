use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use super::{clear_refresh_cookie, refresh_cookie, refresh_token_from};
use crate::{
    dtos::{
        admin::TokenResponse,
        store::{
            AddPasscodeRequest, DuePaymentsQuery, LikeRequest, StoreSignInRequest,
            UpdateStoreRequest,
        },
        ApiResponse, PageQuery,
    },
    middleware::AuthUser,
    models::{Debtor, Like, Store, SubjectKind},
    services::{
        statistics::{DuePayments, LatePayments, MainMenu},
        ServiceError, StoreChanges,
    },
    utils::{hash_password, Password, ValidatedJson, ValidatedPath, ValidatedQuery},
    AppState,
};

pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<StoreSignInRequest>,
) -> Result<(CookieJar, ApiResponse<TokenResponse>), AppError> {
    let issued = state.auth.store_signin(req).await?;
    let jar = jar.add(refresh_cookie(&state, SubjectKind::Store, issued.refresh_token));
    Ok((jar, ApiResponse::ok(issued.response)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<TokenResponse>), AppError> {
    let token = refresh_token_from(&jar, SubjectKind::Store)?;
    let issued = state.auth.refresh(SubjectKind::Store, &token).await?;
    let jar = jar.add(refresh_cookie(&state, SubjectKind::Store, issued.refresh_token));
    Ok((jar, ApiResponse::ok(issued.response)))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser(_principal): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), AppError> {
    if let Ok(token) = refresh_token_from(&jar, SubjectKind::Store) {
        state.auth.logout(&token).await?;
    }
    Ok((
        clear_refresh_cookie(jar, SubjectKind::Store),
        ApiResponse::message("Logged out successfully"),
    ))
}

pub async fn list_stores(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Store>>, AppError> {
    principal.require_admin()?;
    let (stores, total) = state
        .db
        .list_stores(page.limit() as i64, page.offset())
        .await?;
    Ok(ApiResponse::paged(stores, total))
}

pub async fn get_store(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Store>, AppError> {
    principal.require_self(id)?;
    let store = state
        .db
        .get_store(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Store".to_string()))?;
    Ok(ApiResponse::ok(store))
}

/// Stores may edit their profile; wallet and activation are admin-only.
pub async fn update_store(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStoreRequest>,
) -> Result<ApiResponse<Store>, AppError> {
    principal.require_self(id)?;
    if req.wallet.is_some() || req.is_active.is_some() {
        principal.require_admin()?;
    }

    let hashed_password = match req.password {
        Some(password) => Some(
            hash_password(&Password::new(password))
                .map_err(ServiceError::Internal)?
                .into_string(),
        ),
        None => None,
    };
    let deactivated = req.is_active == Some(false);

    let store = state
        .db
        .update_store(
            id,
            StoreChanges {
                hashed_password,
                full_name: req.full_name,
                phone_number: req.phone_number,
                email: req.email,
                image: req.image,
                wallet: req.wallet,
                is_active: req.is_active,
            },
        )
        .await?;

    if deactivated {
        state.db.revoke_subject_sessions(id).await?;
    }

    Ok(ApiResponse::ok(store))
}

pub async fn delete_store(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    principal.require_admin()?;
    state.db.delete_store(id).await?;
    state.db.revoke_subject_sessions(id).await?;
    Ok(ApiResponse::message("Store deleted"))
}

pub async fn add_passcode(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<AddPasscodeRequest>,
) -> Result<ApiResponse<()>, AppError> {
    principal.require_self(id)?;

    let store = state
        .db
        .get_store(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Store".to_string()))?;

    let hashed = hash_password(&Password::new(req.passcode)).map_err(ServiceError::Internal)?;
    state.db.set_store_passcode(store.id, hashed.as_str()).await?;

    tracing::info!(store_id = %store.id, replaced = store.has_passcode(), "Passcode set");
    Ok(ApiResponse::message("Passcode saved"))
}

pub async fn due_payments(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedQuery(query): ValidatedQuery<DuePaymentsQuery>,
) -> Result<ApiResponse<DuePayments>, AppError> {
    principal.require_self(id)?;
    let reference = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let due = state.statistics.due_payments(id, reference).await?;
    Ok(ApiResponse::ok(due))
}

pub async fn main_menu(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<MainMenu>, AppError> {
    principal.require_self(id)?;
    let menu = state.statistics.main_menu(id).await?;
    Ok(ApiResponse::ok(menu))
}

pub async fn late_payments(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<LatePayments>, AppError> {
    principal.require_self(id)?;
    let late = state.statistics.late_payments(id).await?;
    Ok(ApiResponse::ok(late))
}

pub async fn list_likes(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<ApiResponse<Vec<Debtor>>, AppError> {
    let store_id = principal.require_store()?;
    let debtors = state.db.liked_debtors(store_id).await?;
    Ok(ApiResponse::ok(debtors))
}

pub async fn like_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<LikeRequest>,
) -> Result<ApiResponse<Like>, AppError> {
    let store_id = principal.require_store()?;
    let like = state.db.like_debtor(store_id, req.debtor_id).await?;
    Ok(ApiResponse::created(like))
}

pub async fn unlike_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(debtor_id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    let store_id = principal.require_store()?;
    state.db.unlike_debtor(store_id, debtor_id).await?;
    Ok(ApiResponse::message("Debtor removed from likes"))
}
