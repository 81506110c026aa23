use super::{db_error, is_unique_violation, not_found, write_failed, Database, Scope};
use crate::models::{Debtor, DebtorImage, DebtorPhone};
use crate::services::metrics::QueryTimer;
use crate::services::ServiceError;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const DEBTOR_COLUMNS: &str =
    "d.id, d.store_id, d.full_name, d.phone_number, d.image, d.address, d.note, d.created_at, d.updated_at";

#[derive(Debug)]
pub struct NewDebtor {
    pub store_id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub note: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default)]
pub struct DebtorChanges {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub image: Option<String>,
}

impl Database {
    // ===== Debtor Operations =====

    /// Checks the phone and inserts in one transaction.
    #[instrument(skip(self, input), fields(store_id = %input.store_id))]
    pub async fn create_debtor(&self, input: &NewDebtor) -> Result<Debtor, AppError> {
        let timer = QueryTimer::start("create_debtor");
        let failed = write_failed("create debtor");

        let mut tx = self.pool.begin().await.map_err(&failed)?;

        if phone_taken(&mut tx, &input.phone_number, None).await.map_err(&failed)? {
            return Err(ServiceError::PhoneAlreadyRegistered.into());
        }

        if let Some(image) = &input.image {
            if image_used_elsewhere(&mut tx, image, input.store_id).await.map_err(&failed)? {
                return Err(invalid_image(image));
            }
        }

        let debtor = sqlx::query_as::<_, Debtor>(&format!(
            r#"
            INSERT INTO debtors AS d (id, store_id, full_name, phone_number, address, note, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DEBTOR_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.store_id)
        .bind(&input.full_name)
        .bind(&input.phone_number)
        .bind(&input.address)
        .bind(&input.note)
        .bind(&input.image)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| phone_conflict_or(e, &failed))?;

        tx.commit().await.map_err(&failed)?;

        timer.observe_duration();
        info!(debtor_id = %debtor.id, "Debtor created");

        Ok(debtor)
    }

    #[instrument(skip(self))]
    pub async fn list_debtors(
        &self,
        scope: Scope,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Debtor>, i64), AppError> {
        let timer = QueryTimer::start("list_debtors");

        let debtors = sqlx::query_as::<_, Debtor>(&format!(
            r#"
            SELECT {DEBTOR_COLUMNS} FROM debtors d
            WHERE ($1::uuid IS NULL OR d.store_id = $1)
            ORDER BY d.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(scope.store_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debtors"))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM debtors d WHERE ($1::uuid IS NULL OR d.store_id = $1)",
        )
        .bind(scope.store_id())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count debtors"))?;

        timer.observe_duration();
        Ok((debtors, total))
    }

    #[instrument(skip(self))]
    pub async fn get_debtor(&self, scope: Scope, id: Uuid) -> Result<Debtor, AppError> {
        sqlx::query_as::<_, Debtor>(&format!(
            "SELECT {DEBTOR_COLUMNS} FROM debtors d WHERE d.id = $1 AND ($2::uuid IS NULL OR d.store_id = $2)"
        ))
        .bind(id)
        .bind(scope.store_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get debtor"))?
        .ok_or_else(|| not_found("Debtor", id))
    }

    /// Looks in the primary number and in the extra numbers.
    #[instrument(skip(self))]
    pub async fn find_debtor_by_phone(&self, scope: Scope, phone: &str) -> Result<Debtor, AppError> {
        sqlx::query_as::<_, Debtor>(&format!(
            r#"
            SELECT {DEBTOR_COLUMNS} FROM debtors d
            WHERE ($2::uuid IS NULL OR d.store_id = $2)
              AND (d.phone_number = $1
                   OR EXISTS (SELECT 1 FROM debtor_phones p WHERE p.debtor_id = d.id AND p.phone_number = $1))
            LIMIT 1
            "#
        ))
        .bind(phone)
        .bind(scope.store_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find debtor by phone"))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Debtor with phone {} not found", phone))
        })
    }

    /// A new phone must not belong to any other debtor; keeping one's own is fine.
    #[instrument(skip(self, changes))]
    pub async fn update_debtor(
        &self,
        scope: Scope,
        id: Uuid,
        changes: DebtorChanges,
    ) -> Result<Debtor, AppError> {
        let timer = QueryTimer::start("update_debtor");
        let failed = write_failed("update debtor");

        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let current = lock_debtor(&mut tx, scope, id).await.map_err(&failed)?
            .ok_or_else(|| not_found("Debtor", id))?;

        if let Some(phone) = &changes.phone_number {
            if phone_taken(&mut tx, phone, Some(id)).await.map_err(&failed)? {
                return Err(ServiceError::PhoneAlreadyRegistered.into());
            }
        }

        if let Some(image) = &changes.image {
            if image_used_elsewhere(&mut tx, image, current.store_id).await.map_err(&failed)? {
                return Err(invalid_image(image));
            }
        }

        let debtor = sqlx::query_as::<_, Debtor>(&format!(
            r#"
            UPDATE debtors AS d SET
                full_name = COALESCE($2, d.full_name),
                phone_number = COALESCE($3, d.phone_number),
                address = COALESCE($4, d.address),
                note = COALESCE($5, d.note),
                image = COALESCE($6, d.image),
                updated_at = NOW()
            WHERE d.id = $1
            RETURNING {DEBTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.full_name)
        .bind(&changes.phone_number)
        .bind(&changes.address)
        .bind(&changes.note)
        .bind(&changes.image)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| phone_conflict_or(e, &failed))?;

        tx.commit().await.map_err(&failed)?;

        timer.observe_duration();
        info!(debtor_id = %id, "Debtor updated");

        Ok(debtor)
    }

    /// Removes the debtor with its debts, payments and images. Returns the
    /// image paths no other row references, so the caller can delete the files.
    #[instrument(skip(self))]
    pub async fn delete_debtor(&self, scope: Scope, id: Uuid) -> Result<Vec<String>, AppError> {
        let failed = write_failed("delete debtor");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let debtor = lock_debtor(&mut tx, scope, id).await.map_err(&failed)?
            .ok_or_else(|| not_found("Debtor", id))?;

        let mut images: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT image FROM debtor_images WHERE debtor_id = $1
            UNION
            SELECT i.image FROM debt_images i JOIN debts t ON t.id = i.debt_id WHERE t.debtor_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(&failed)?;

        if let Some(main) = debtor.image {
            if !images.contains(&main) {
                images.push(main);
            }
        }

        sqlx::query("DELETE FROM debtors WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(&failed)?;

        let orphaned = unreferenced_images(&mut tx, &images).await.map_err(&failed)?;

        tx.commit().await.map_err(&failed)?;

        info!(debtor_id = %id, "Debtor deleted");
        Ok(orphaned)
    }

    // ===== Debtor Image Operations =====

    /// Makes `image` the debtor's main picture and records it in the
    /// gallery. The previous main picture stays in the gallery.
    #[instrument(skip(self))]
    pub async fn set_debtor_image(
        &self,
        scope: Scope,
        debtor_id: Uuid,
        image: &str,
    ) -> Result<DebtorImage, AppError> {
        let timer = QueryTimer::start("set_debtor_image");
        let failed = write_failed("upload debtor image");

        let mut tx = self.pool.begin().await.map_err(&failed)?;

        lock_debtor(&mut tx, scope, debtor_id).await.map_err(&failed)?
            .ok_or_else(|| not_found("Debtor", debtor_id))?;

        sqlx::query("UPDATE debtors SET image = $2, updated_at = NOW() WHERE id = $1")
            .bind(debtor_id)
            .bind(image)
            .execute(&mut *tx)
            .await
            .map_err(&failed)?;

        let row = insert_debtor_image(&mut tx, debtor_id, image)
            .await
            .map_err(&failed)?;

        tx.commit().await.map_err(&failed)?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn add_debtor_image(
        &self,
        scope: Scope,
        debtor_id: Uuid,
        image: &str,
    ) -> Result<DebtorImage, AppError> {
        let failed = write_failed("add debtor image");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let debtor = lock_debtor(&mut tx, scope, debtor_id).await.map_err(&failed)?
            .ok_or_else(|| not_found("Debtor", debtor_id))?;

        if image_used_elsewhere(&mut tx, image, debtor.store_id).await.map_err(&failed)? {
            return Err(invalid_image(image));
        }

        let row = insert_debtor_image(&mut tx, debtor_id, image)
            .await
            .map_err(&failed)?;

        tx.commit().await.map_err(&failed)?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_debtor_images(
        &self,
        scope: Scope,
        debtor_id: Uuid,
    ) -> Result<Vec<DebtorImage>, AppError> {
        self.get_debtor(scope, debtor_id).await?;

        sqlx::query_as::<_, DebtorImage>(
            "SELECT id, debtor_id, image, created_at FROM debtor_images WHERE debtor_id = $1 ORDER BY created_at DESC",
        )
        .bind(debtor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debtor images"))
    }

    /// Deletes a gallery row; clears the main picture if it pointed at it.
    /// The flag is true when no row references the file any more.
    #[instrument(skip(self))]
    pub async fn remove_debtor_image(
        &self,
        scope: Scope,
        image_id: Uuid,
    ) -> Result<(DebtorImage, bool), AppError> {
        let failed = write_failed("remove debtor image");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let image = sqlx::query_as::<_, DebtorImage>(
            r#"
            DELETE FROM debtor_images i
            USING debtors d
            WHERE i.id = $1 AND d.id = i.debtor_id AND ($2::uuid IS NULL OR d.store_id = $2)
            RETURNING i.id, i.debtor_id, i.image, i.created_at
            "#,
        )
        .bind(image_id)
        .bind(scope.store_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(&failed)?
        .ok_or_else(|| not_found("Debtor image", image_id))?;

        sqlx::query("UPDATE debtors SET image = NULL, updated_at = NOW() WHERE id = $1 AND image = $2")
            .bind(image.debtor_id)
            .bind(&image.image)
            .execute(&mut *tx)
            .await
            .map_err(&failed)?;

        let orphaned = !unreferenced_images(&mut tx, std::slice::from_ref(&image.image))
            .await
            .map_err(&failed)?
            .is_empty();

        tx.commit().await.map_err(&failed)?;
        Ok((image, orphaned))
    }

    // ===== Debtor Phone Operations =====

    #[instrument(skip(self))]
    pub async fn add_debtor_phone(
        &self,
        scope: Scope,
        debtor_id: Uuid,
        phone_number: &str,
    ) -> Result<DebtorPhone, AppError> {
        let failed = write_failed("add debtor phone");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        lock_debtor(&mut tx, scope, debtor_id).await.map_err(&failed)?
            .ok_or_else(|| not_found("Debtor", debtor_id))?;

        if phone_taken(&mut tx, phone_number, None).await.map_err(&failed)? {
            return Err(ServiceError::PhoneAlreadyRegistered.into());
        }

        let phone = sqlx::query_as::<_, DebtorPhone>(
            r#"
            INSERT INTO debtor_phones (id, debtor_id, phone_number)
            VALUES ($1, $2, $3)
            RETURNING id, debtor_id, phone_number, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(debtor_id)
        .bind(phone_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| phone_conflict_or(e, &failed))?;

        tx.commit().await.map_err(&failed)?;

        info!(debtor_id = %debtor_id, phone_id = %phone.id, "Debtor phone added");
        Ok(phone)
    }

    #[instrument(skip(self))]
    pub async fn remove_debtor_phone(&self, scope: Scope, phone_id: Uuid) -> Result<DebtorPhone, AppError> {
        let failed = write_failed("remove debtor phone");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let phone = sqlx::query_as::<_, DebtorPhone>(
            r#"
            DELETE FROM debtor_phones p
            USING debtors d
            WHERE p.id = $1 AND d.id = p.debtor_id AND ($2::uuid IS NULL OR d.store_id = $2)
            RETURNING p.id, p.debtor_id, p.phone_number, p.created_at, p.updated_at
            "#,
        )
        .bind(phone_id)
        .bind(scope.store_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(&failed)?
        .ok_or_else(|| not_found("Debtor phone", phone_id))?;

        tx.commit().await.map_err(&failed)?;
        Ok(phone)
    }

    #[instrument(skip(self))]
    pub async fn list_debtor_phones(
        &self,
        scope: Scope,
        debtor_id: Uuid,
    ) -> Result<Vec<DebtorPhone>, AppError> {
        self.get_debtor(scope, debtor_id).await?;

        sqlx::query_as::<_, DebtorPhone>(
            "SELECT id, debtor_id, phone_number, created_at, updated_at FROM debtor_phones WHERE debtor_id = $1 ORDER BY created_at",
        )
        .bind(debtor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debtor phones"))
    }
}

async fn lock_debtor(
    tx: &mut Transaction<'_, Postgres>,
    scope: Scope,
    id: Uuid,
) -> Result<Option<Debtor>, sqlx::Error> {
    sqlx::query_as::<_, Debtor>(&format!(
        "SELECT {DEBTOR_COLUMNS} FROM debtors d WHERE d.id = $1 AND ($2::uuid IS NULL OR d.store_id = $2) FOR UPDATE"
    ))
    .bind(id)
    .bind(scope.store_id())
    .fetch_optional(&mut **tx)
    .await
}

/// True when `phone` is a main or extra number of any debtor other than
/// `except`.
async fn phone_taken(
    tx: &mut Transaction<'_, Postgres>,
    phone: &str,
    except: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM debtors WHERE phone_number = $1 AND ($2::uuid IS NULL OR id <> $2)
            UNION ALL
            SELECT 1 FROM debtor_phones WHERE phone_number = $1 AND ($2::uuid IS NULL OR debtor_id <> $2)
        )
        "#,
    )
    .bind(phone)
    .bind(except)
    .fetch_one(&mut **tx)
    .await
}

/// Image keys never span stores: true when a debtor of another store
/// already uses `image`.
async fn image_used_elsewhere(
    tx: &mut Transaction<'_, Postgres>,
    image: &str,
    store_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM debtors d
            WHERE d.store_id <> $2
              AND (d.image = $1
                   OR EXISTS (SELECT 1 FROM debtor_images i WHERE i.debtor_id = d.id AND i.image = $1))
        )
        "#,
    )
    .bind(image)
    .bind(store_id)
    .fetch_one(&mut **tx)
    .await
}

fn invalid_image(image: &str) -> AppError {
    ServiceError::ValidationError(format!("Invalid image path: {}", image)).into()
}

/// The subset of `images` that no debtor, gallery row or debt image still
/// points at.
pub(super) async fn unreferenced_images(
    tx: &mut Transaction<'_, Postgres>,
    images: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if images.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar(
        r#"
        SELECT k FROM UNNEST($1::text[]) AS k
        WHERE NOT EXISTS (SELECT 1 FROM debtors WHERE image = k)
          AND NOT EXISTS (SELECT 1 FROM debtor_images WHERE image = k)
          AND NOT EXISTS (SELECT 1 FROM debt_images WHERE image = k)
        "#,
    )
    .bind(images)
    .fetch_all(&mut **tx)
    .await
}

async fn insert_debtor_image(
    tx: &mut Transaction<'_, Postgres>,
    debtor_id: Uuid,
    image: &str,
) -> Result<DebtorImage, sqlx::Error> {
    sqlx::query_as::<_, DebtorImage>(
        r#"
        INSERT INTO debtor_images (id, debtor_id, image)
        VALUES ($1, $2, $3)
        RETURNING id, debtor_id, image, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(debtor_id)
    .bind(image)
    .fetch_one(&mut **tx)
    .await
}

/// A unique violation that slipped past the pre-check is still a phone clash.
fn phone_conflict_or(e: sqlx::Error, failed: &impl Fn(sqlx::Error) -> AppError) -> AppError {
    if is_unique_violation(&e) {
        ServiceError::PhoneAlreadyRegistered.into()
    } else {
        failed(e)
    }
}
