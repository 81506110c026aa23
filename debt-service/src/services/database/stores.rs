use super::{db_error, is_unique_violation, not_found, Database};
use crate::models::Store;
use crate::services::metrics::QueryTimer;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const STORE_COLUMNS: &str = "id, login, hashed_password, full_name, phone_number, email, image, \
     wallet, hashed_passcode, is_active, created_at, updated_at";

#[derive(Debug)]
pub struct NewStore {
    pub login: String,
    pub hashed_password: String,
    pub full_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub wallet: Decimal,
}

#[derive(Debug, Default)]
pub struct StoreChanges {
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub wallet: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl Database {
    // ===== Store Operations =====

    #[instrument(skip(self, input), fields(login = %input.login))]
    pub async fn create_store(&self, input: &NewStore) -> Result<Store, AppError> {
        let timer = QueryTimer::start("create_store");

        let store = sqlx::query_as::<_, Store>(&format!(
            r#"
            INSERT INTO stores (id, login, hashed_password, full_name, phone_number, email, image, wallet)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {STORE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.login)
        .bind(&input.hashed_password)
        .bind(&input.full_name)
        .bind(&input.phone_number)
        .bind(&input.email)
        .bind(&input.image)
        .bind(input.wallet)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(anyhow::anyhow!("Store login '{}' already exists", input.login))
            } else {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create store: {}", e))
            }
        })?;

        timer.observe_duration();
        info!(store_id = %store.id, "Store created");

        Ok(store)
    }

    /// One page of stores plus the total count.
    #[instrument(skip(self))]
    pub async fn list_stores(&self, limit: i64, offset: i64) -> Result<(Vec<Store>, i64), AppError> {
        let timer = QueryTimer::start("list_stores");

        let stores = sqlx::query_as::<_, Store>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list stores"))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count stores"))?;

        timer.observe_duration();
        Ok((stores, total))
    }

    #[instrument(skip(self))]
    pub async fn get_store(&self, id: Uuid) -> Result<Option<Store>, AppError> {
        sqlx::query_as::<_, Store>(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get store"))
    }

    #[instrument(skip(self))]
    pub async fn find_store_by_login(&self, login: &str) -> Result<Option<Store>, AppError> {
        sqlx::query_as::<_, Store>(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE login = $1"))
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find store"))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_store(&self, id: Uuid, changes: StoreChanges) -> Result<Store, AppError> {
        let timer = QueryTimer::start("update_store");

        let store = sqlx::query_as::<_, Store>(&format!(
            r#"
            UPDATE stores SET
                hashed_password = COALESCE($2, hashed_password),
                full_name = COALESCE($3, full_name),
                phone_number = COALESCE($4, phone_number),
                email = COALESCE($5, email),
                image = COALESCE($6, image),
                wallet = COALESCE($7, wallet),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.hashed_password)
        .bind(&changes.full_name)
        .bind(&changes.phone_number)
        .bind(&changes.email)
        .bind(&changes.image)
        .bind(changes.wallet)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update store"))?
        .ok_or_else(|| not_found("Store", id))?;

        timer.observe_duration();
        Ok(store)
    }

    #[instrument(skip(self, hashed_passcode))]
    pub async fn set_store_passcode(&self, id: Uuid, hashed_passcode: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE stores SET hashed_passcode = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hashed_passcode)
        .execute(&self.pool)
        .await
        .map_err(db_error("set passcode"))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Store", id));
        }
        Ok(())
    }

    /// Deleting a store cascades to its debtors and their ledgers.
    #[instrument(skip(self))]
    pub async fn delete_store(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete store"))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Store", id));
        }

        info!(store_id = %id, "Store deleted");
        Ok(())
    }
}
