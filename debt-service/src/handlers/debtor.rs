use axum::extract::{Multipart, State};
use service_core::error::AppError;
use uuid::Uuid;

use super::{discard_files, store_uploaded_image};
use crate::{
    dtos::{
        debtor::{
            AddDebtorImageRequest, AddDebtorPhoneRequest, CreateDebtorRequest, UpdateDebtorRequest,
        },
        ApiResponse, PageQuery,
    },
    middleware::{AuthUser, Principal},
    models::{Debtor, DebtorImage, DebtorPhone},
    services::{
        statistics::DebtorSummary, storage::image_extension, DebtorChanges, NewDebtor,
        ServiceError,
    },
    utils::{ValidatedJson, ValidatedPath, ValidatedQuery},
    AppState,
};

const FOLDER: &str = "debtors";

/// Stores always create under themselves; admins must name the store.
async fn owning_store(
    state: &AppState,
    principal: &Principal,
    requested: Option<Uuid>,
) -> Result<Uuid, AppError> {
    if let Ok(store_id) = principal.require_store() {
        return Ok(store_id);
    }

    let store_id = requested.ok_or_else(|| {
        ServiceError::ValidationError("store_id is required when an admin creates a debtor".to_string())
    })?;
    state
        .db
        .get_store(store_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Store".to_string()))?;
    Ok(store_id)
}

pub async fn create_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateDebtorRequest>,
) -> Result<ApiResponse<Debtor>, AppError> {
    let store_id = owning_store(&state, &principal, req.store_id).await?;

    let debtor = state
        .db
        .create_debtor(&NewDebtor {
            store_id,
            full_name: req.full_name,
            phone_number: req.phone_number,
            address: req.address,
            note: req.note,
            image: req.image,
        })
        .await?;

    Ok(ApiResponse::created(debtor))
}

pub async fn list_debtors(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Debtor>>, AppError> {
    let (debtors, total) = state
        .db
        .list_debtors(principal.scope(), page.limit() as i64, page.offset())
        .await?;
    Ok(ApiResponse::paged(debtors, total))
}

pub async fn find_by_phone(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(phone): ValidatedPath<String>,
) -> Result<ApiResponse<Debtor>, AppError> {
    let debtor = state
        .db
        .find_debtor_by_phone(principal.scope(), &phone)
        .await?;
    Ok(ApiResponse::ok(debtor))
}

pub async fn get_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Debtor>, AppError> {
    let debtor = state.db.get_debtor(principal.scope(), id).await?;
    Ok(ApiResponse::ok(debtor))
}

pub async fn update_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateDebtorRequest>,
) -> Result<ApiResponse<Debtor>, AppError> {
    let debtor = state
        .db
        .update_debtor(
            principal.scope(),
            id,
            DebtorChanges {
                full_name: req.full_name,
                phone_number: req.phone_number,
                address: req.address,
                note: req.note,
                image: req.image,
            },
        )
        .await?;
    Ok(ApiResponse::ok(debtor))
}

pub async fn delete_debtor(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    let images = state.db.delete_debtor(principal.scope(), id).await?;
    discard_files(&state, &images).await;
    Ok(ApiResponse::message("Debtor deleted"))
}

pub async fn total_debt(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<DebtorSummary>, AppError> {
    let summary = state.statistics.debtor_summary(principal.scope(), id).await?;
    Ok(ApiResponse::ok(summary))
}

// ===== Images =====

/// Multipart upload that becomes the debtor's main picture. The stored file
/// is removed again if the database step fails.
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
    multipart: Multipart,
) -> Result<ApiResponse<DebtorImage>, AppError> {
    let scope = principal.scope();
    state.db.get_debtor(scope, id).await?;

    let key = store_uploaded_image(&state, multipart, FOLDER).await?;

    match state.db.set_debtor_image(scope, id, &key).await {
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
) -> Result<ApiResponse<Vec<DebtorImage>>, AppError> {
    let images = state.db.list_debtor_images(principal.scope(), id).await?;
    Ok(ApiResponse::ok(images))
}

/// Attaches a file that was uploaded earlier under `debtors/`. Keys already
/// used by another store are refused.
pub async fn add_image(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<AddDebtorImageRequest>,
) -> Result<ApiResponse<DebtorImage>, AppError> {
    if !is_debtor_image_key(&req.image) {
        return Err(ServiceError::ValidationError(format!("Invalid image path: {}", req.image)).into());
    }

    let image = state
        .db
        .add_debtor_image(principal.scope(), req.debtor_id, &req.image)
        .await?;
    Ok(ApiResponse::created(image))
}

pub async fn remove_image(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(image_id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<DebtorImage>, AppError> {
    let (image, orphaned) = state.db.remove_debtor_image(principal.scope(), image_id).await?;
    if orphaned {
        discard_files(&state, std::slice::from_ref(&image.image)).await;
    }
    Ok(ApiResponse::ok(image))
}

fn is_debtor_image_key(key: &str) -> bool {
    key.strip_prefix("debtors/")
        .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
        && image_extension(key).is_some()
}

// ===== Phones =====

pub async fn list_phones(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<Vec<DebtorPhone>>, AppError> {
    let phones = state.db.list_debtor_phones(principal.scope(), id).await?;
    Ok(ApiResponse::ok(phones))
}

pub async fn add_phone(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<AddDebtorPhoneRequest>,
) -> Result<ApiResponse<DebtorPhone>, AppError> {
    let phone = state
        .db
        .add_debtor_phone(principal.scope(), req.debtor_id, &req.phone_number)
        .await?;
    Ok(ApiResponse::created(phone))
}

pub async fn remove_phone(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedPath(phone_id): ValidatedPath<Uuid>,
) -> Result<ApiResponse<DebtorPhone>, AppError> {
    let phone = state.db.remove_debtor_phone(principal.scope(), phone_id).await?;
    Ok(ApiResponse::ok(phone))
}

#[cfg(test)]
mod tests {
    use super::is_debtor_image_key;

    #[test]
    fn only_stored_debtor_images_can_be_attached() {
        assert!(is_debtor_image_key("debtors/5f0c.png"));
        assert!(!is_debtor_image_key("debts/5f0c.png"));
        assert!(!is_debtor_image_key("debtors/../secret.png"));
        assert!(!is_debtor_image_key("debtors/sub/a.png"));
        assert!(!is_debtor_image_key("debtors/notes.txt"));
        assert!(!is_debtor_image_key("debtors/"));
    }
}
