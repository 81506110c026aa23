use super::{db_error, Database};
use crate::models::{RefreshSession, SubjectKind};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

impl Database {
    // ===== Refresh Session Operations =====

    #[instrument(skip(self, token_hash))]
    pub async fn create_refresh_session(
        &self,
        id: Uuid,
        subject_id: Uuid,
        kind: SubjectKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_sessions (id, subject_id, subject_kind, token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("store refresh session"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_refresh_session(&self, id: Uuid) -> Result<Option<RefreshSession>, AppError> {
        sqlx::query_as::<_, RefreshSession>(
            r#"
            SELECT id, subject_id, subject_kind, token_hash, expires_at, revoked, created_at
            FROM refresh_sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("load refresh session"))
    }

    /// Returns whether a live session was revoked by this call.
    #[instrument(skip(self))]
    pub async fn revoke_refresh_session(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_sessions SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("revoke refresh session"))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    pub async fn revoke_subject_sessions(&self, subject_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_sessions SET revoked = TRUE WHERE subject_id = $1 AND revoked = FALSE",
        )
        .bind(subject_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("revoke refresh sessions"))?;
        Ok(result.rows_affected())
    }
}
