use super::{db_error, not_found, Database, Scope};
use crate::models::{Debtor, Like};
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

impl Database {
    // ===== Like Operations =====

    /// Idempotent: liking twice returns the existing row.
    #[instrument(skip(self))]
    pub async fn like_debtor(&self, store_id: Uuid, debtor_id: Uuid) -> Result<Like, AppError> {
        self.get_debtor(Scope::Store(store_id), debtor_id).await?;

        sqlx::query_as::<_, Like>(
            r#"
            INSERT INTO likes (id, store_id, debtor_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (store_id, debtor_id) DO UPDATE SET store_id = EXCLUDED.store_id
            RETURNING id, store_id, debtor_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(debtor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("like debtor"))
    }

    #[instrument(skip(self))]
    pub async fn unlike_debtor(&self, store_id: Uuid, debtor_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE store_id = $1 AND debtor_id = $2")
            .bind(store_id)
            .bind(debtor_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("unlike debtor"))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Like for debtor", debtor_id));
        }
        Ok(())
    }

    /// Debtors the store marked as favourites, most recent first.
    #[instrument(skip(self))]
    pub async fn liked_debtors(&self, store_id: Uuid) -> Result<Vec<Debtor>, AppError> {
        sqlx::query_as::<_, Debtor>(
            r#"
            SELECT d.id, d.store_id, d.full_name, d.phone_number, d.image, d.address, d.note,
                   d.created_at, d.updated_at
            FROM likes l
            JOIN debtors d ON d.id = l.debtor_id
            WHERE l.store_id = $1
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list liked debtors"))
    }
}
