//! HTTP handlers for debt-service.

pub mod admin;
pub mod debt;
pub mod debtor;
pub mod payment;
pub mod store;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    config::Environment,
    models::SubjectKind,
    services::storage::{image_extension, image_key},
    AppState,
};

/// Service health check
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        e
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// HttpOnly cookie carrying a refresh token for `kind`.
pub(crate) fn refresh_cookie(state: &AppState, kind: SubjectKind, token: String) -> Cookie<'static> {
    Cookie::build((kind.cookie_name(), token))
        .http_only(true)
        .secure(state.config.environment == Environment::Prod)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::days(state.config.jwt.refresh_token_expiry_days))
        .build()
}

pub(crate) fn clear_refresh_cookie(jar: CookieJar, kind: SubjectKind) -> CookieJar {
    jar.remove(Cookie::build(kind.cookie_name()).path("/"))
}

pub(crate) fn refresh_token_from(jar: &CookieJar, kind: SubjectKind) -> Result<String, AppError> {
    jar.get(kind.cookie_name())
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Refresh token cookie missing")))
}

/// Reads the `file` field of an image upload, stores it under `folder` and
/// returns the storage key.
pub(crate) async fn store_uploaded_image(
    state: &AppState,
    mut multipart: Multipart,
    folder: &str,
) -> Result<String, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let extension = image_extension(&file_name).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Only jpg, jpeg, png, gif and heic images are allowed"
            ))
        })?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read upload: {}", e)))?;

        if data.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Uploaded file is empty")));
        }
        if data.len() > state.config.uploads.max_bytes {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "File exceeds the {} byte limit",
                state.config.uploads.max_bytes
            )));
        }

        let key = image_key(folder, &extension);
        state.storage.upload(&key, data.to_vec()).await?;
        tracing::info!(key = %key, size = data.len(), "Image stored");
        return Ok(key);
    }

    Err(AppError::BadRequest(anyhow::anyhow!("Missing 'file' field")))
}

/// Best-effort removal of files whose rows are already gone.
pub(crate) async fn discard_files(state: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = state.storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete stored file");
        }
    }
}
