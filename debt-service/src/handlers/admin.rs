use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use uuid::Uuid;

use super::{clear_refresh_cookie, refresh_cookie, refresh_token_from};
use crate::{
    dtos::{
        admin::{AdminSignInRequest, CreateAdminRequest, TokenResponse, UpdateAdminRequest},
        store::CreateStoreRequest,
        ApiResponse,
    },
    middleware::AuthUser,
    models::{Admin, AdminRole, Store, SubjectKind},
    services::{AdminChanges, NewStore, ServiceError},
    utils::{hash_password, Password, ValidatedJson, ValidatedPath},
    AppState,
};

pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<AdminSignInRequest>,
) -> Result<(CookieJar, ApiResponse<TokenResponse>), AppError> {
    let issued = state.auth.admin_signin(req).await?;
    let jar = jar.add(refresh_cookie(&state, SubjectKind::Admin, issued.refresh_token));
    Ok((jar, ApiResponse::ok(issued.response)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<TokenResponse>), AppError> {
    let token = refresh_token_from(&jar, SubjectKind::Admin)?;
    let issued = state.auth.refresh(SubjectKind::Admin, &token).await?;
    let jar = jar.add(refresh_cookie(&state, SubjectKind::Admin, issued.refresh_token));
    Ok((jar, ApiResponse::ok(issued.response)))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser(_principal): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), AppError> {
    if let Ok(token) = refresh_token_from(&jar, SubjectKind::Admin) {
        state.auth.logout(&token).await?;
    }
    Ok((
        clear_refresh_cookie(jar, SubjectKind::Admin),
        ApiResponse::message("Logged out successfully"),
    ))
}

pub async fn create_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateAdminRequest>,
) -> Result<ApiResponse<Admin>, AppError> {
    principal.require_super_admin()?;

    let hashed = hash_password(&Password::new(req.password)).map_err(ServiceError::Internal)?;
    let admin = state
        .db
        .create_admin(
            &req.username,
            hashed.as_str(),
            &req.phone_number,
            req.email.as_deref(),
            AdminRole::Admin,
        )
        .await?;

    Ok(ApiResponse::created(admin))
}

pub async fn create_store(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateStoreRequest>,
) -> Result<ApiResponse<Store>, AppError> {
    principal.require_admin()?;

    let hashed = hash_password(&Password::new(req.password)).map_err(ServiceError::Internal)?;
    let store = state
        .db
        .create_store(&NewStore {
            login: req.login,
            hashed_password: hashed.into_string(),
            full_name: req.full_name,
            phone_number: req.phone_number,
            email: req.email,
            image: req.image,
            wallet: req.wallet.unwrap_or_default(),
        })
        .await?;

    Ok(ApiResponse::created(store))
}

pub async fn list_admins(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<ApiResponse<Vec<Admin>>, AppError> {
    principal.require_admin()?;
    let admins = state.db.list_admins().await?;
    let total = admins.len() as i64;
    Ok(ApiResponse::paged(admins, total))
}

pub async fn get_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Admin>, AppError> {
    principal.require_self(id)?;
    let admin = state
        .db
        .get_admin(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Admin".to_string()))?;
    Ok(ApiResponse::ok(admin))
}

pub async fn update_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateAdminRequest>,
) -> Result<ApiResponse<Admin>, AppError> {
    principal.require_self(id)?;

    let hashed_password = match req.password {
        Some(password) => Some(
            hash_password(&Password::new(password))
                .map_err(ServiceError::Internal)?
                .into_string(),
        ),
        None => None,
    };

    let admin = state
        .db
        .update_admin(
            id,
            AdminChanges {
                username: req.username,
                hashed_password,
                phone_number: req.phone_number,
                email: req.email,
            },
        )
        .await?;

    Ok(ApiResponse::ok(admin))
}

pub async fn delete_admin(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    principal.require_self(id)?;
    state.db.delete_admin(id).await?;
    state.db.revoke_subject_sessions(id).await?;
    Ok(ApiResponse::message("Admin deleted"))
}
