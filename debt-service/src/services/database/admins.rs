use super::{db_error, is_unique_violation, not_found, Database};
use crate::models::{Admin, AdminRole};
use crate::services::metrics::QueryTimer;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const ADMIN_COLUMNS: &str =
    "id, username, phone_number, email, hashed_password, role, created_at, updated_at";

/// Fields of an admin profile that may change; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct AdminChanges {
    pub username: Option<String>,
    pub hashed_password: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl Database {
    // ===== Admin Operations =====

    #[instrument(skip(self, hashed_password), fields(username = %username))]
    pub async fn create_admin(
        &self,
        username: &str,
        hashed_password: &str,
        phone_number: &str,
        email: Option<&str>,
        role: AdminRole,
    ) -> Result<Admin, AppError> {
        let timer = QueryTimer::start("create_admin");

        let admin = sqlx::query_as::<_, Admin>(&format!(
            r#"
            INSERT INTO admins (id, username, phone_number, email, hashed_password, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(phone_number)
        .bind(email)
        .bind(hashed_password)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(anyhow::anyhow!("Admin '{}' already exists", username))
            } else {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create admin: {}", e))
            }
        })?;

        timer.observe_duration();
        info!(admin_id = %admin.id, role = %admin.role, "Admin created");

        Ok(admin)
    }

    #[instrument(skip(self))]
    pub async fn list_admins(&self) -> Result<Vec<Admin>, AppError> {
        let timer = QueryTimer::start("list_admins");

        let admins = sqlx::query_as::<_, Admin>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list admins"))?;

        timer.observe_duration();
        Ok(admins)
    }

    #[instrument(skip(self))]
    pub async fn get_admin(&self, id: Uuid) -> Result<Option<Admin>, AppError> {
        sqlx::query_as::<_, Admin>(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get admin"))
    }

    #[instrument(skip(self))]
    pub async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, AppError> {
        sqlx::query_as::<_, Admin>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find admin"))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_admin(&self, id: Uuid, changes: AdminChanges) -> Result<Admin, AppError> {
        let timer = QueryTimer::start("update_admin");

        let admin = sqlx::query_as::<_, Admin>(&format!(
            r#"
            UPDATE admins SET
                username = COALESCE($2, username),
                hashed_password = COALESCE($3, hashed_password),
                phone_number = COALESCE($4, phone_number),
                email = COALESCE($5, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.hashed_password)
        .bind(&changes.phone_number)
        .bind(&changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(anyhow::anyhow!("Username already taken"))
            } else {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update admin: {}", e))
            }
        })?
        .ok_or_else(|| not_found("Admin", id))?;

        timer.observe_duration();
        Ok(admin)
    }

    #[instrument(skip(self))]
    pub async fn delete_admin(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete admin"))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Admin", id));
        }

        info!(admin_id = %id, "Admin deleted");
        Ok(())
    }
}
