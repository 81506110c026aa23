use super::debtors::unreferenced_images;
use super::{db_error, not_found, write_failed, Database, Scope};
use crate::models::{Debt, DebtImage};
use crate::services::metrics::QueryTimer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const DEBT_COLUMNS: &str = "t.id, t.debtor_id, t.debt_sum, t.month_sum, t.debt_period, t.debt_date, \
     t.description, t.created_at, t.updated_at";

#[derive(Debug)]
pub struct NewDebt {
    pub debtor_id: Uuid,
    pub debt_sum: Decimal,
    pub month_sum: Decimal,
    pub debt_period: i32,
    pub debt_date: DateTime<Utc>,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct DebtChanges {
    pub debt_sum: Option<Decimal>,
    pub month_sum: Option<Decimal>,
    pub debt_period: Option<i32>,
    pub debt_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl Database {
    // ===== Debt Operations =====

    #[instrument(skip(self, input), fields(debtor_id = %input.debtor_id))]
    pub async fn create_debt(&self, scope: Scope, input: &NewDebt) -> Result<Debt, AppError> {
        let timer = QueryTimer::start("create_debt");

        self.get_debtor(scope, input.debtor_id).await?;

        let debt = sqlx::query_as::<_, Debt>(&format!(
            r#"
            INSERT INTO debts AS t (id, debtor_id, debt_sum, month_sum, debt_period, debt_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DEBT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.debtor_id)
        .bind(input.debt_sum)
        .bind(input.month_sum)
        .bind(input.debt_period)
        .bind(input.debt_date)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(write_failed("create debt"))?;

        timer.observe_duration();
        info!(debt_id = %debt.id, debt_sum = %debt.debt_sum, "Debt created");

        Ok(debt)
    }

    #[instrument(skip(self))]
    pub async fn list_debts(&self, scope: Scope) -> Result<Vec<Debt>, AppError> {
        let timer = QueryTimer::start("list_debts");

        let debts = sqlx::query_as::<_, Debt>(&format!(
            r#"
            SELECT {DEBT_COLUMNS} FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE ($1::uuid IS NULL OR d.store_id = $1)
            ORDER BY t.debt_date DESC
            "#
        ))
        .bind(scope.store_id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debts"))?;

        timer.observe_duration();
        Ok(debts)
    }

    #[instrument(skip(self))]
    pub async fn list_debts_page(
        &self,
        scope: Scope,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Debt>, i64), AppError> {
        let timer = QueryTimer::start("list_debts_page");

        let debts = sqlx::query_as::<_, Debt>(&format!(
            r#"
            SELECT {DEBT_COLUMNS} FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE ($1::uuid IS NULL OR d.store_id = $1)
            ORDER BY t.debt_date DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(scope.store_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debts"))?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE ($1::uuid IS NULL OR d.store_id = $1)
            "#,
        )
        .bind(scope.store_id())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count debts"))?;

        timer.observe_duration();
        Ok((debts, total))
    }

    #[instrument(skip(self))]
    pub async fn get_debt(&self, scope: Scope, id: Uuid) -> Result<Debt, AppError> {
        sqlx::query_as::<_, Debt>(&format!(
            r#"
            SELECT {DEBT_COLUMNS} FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE t.id = $1 AND ($2::uuid IS NULL OR d.store_id = $2)
            "#
        ))
        .bind(id)
        .bind(scope.store_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get debt"))?
        .ok_or_else(|| not_found("Debt", id))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_debt(
        &self,
        scope: Scope,
        id: Uuid,
        changes: DebtChanges,
    ) -> Result<Debt, AppError> {
        let timer = QueryTimer::start("update_debt");

        let debt = sqlx::query_as::<_, Debt>(&format!(
            r#"
            UPDATE debts AS t SET
                debt_sum = COALESCE($3, t.debt_sum),
                month_sum = COALESCE($4, t.month_sum),
                debt_period = COALESCE($5, t.debt_period),
                debt_date = COALESCE($6, t.debt_date),
                description = COALESCE($7, t.description),
                updated_at = NOW()
            FROM debtors d
            WHERE t.id = $1 AND d.id = t.debtor_id AND ($2::uuid IS NULL OR d.store_id = $2)
            RETURNING {DEBT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.store_id())
        .bind(changes.debt_sum)
        .bind(changes.month_sum)
        .bind(changes.debt_period)
        .bind(changes.debt_date)
        .bind(&changes.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_failed("update debt"))?
        .ok_or_else(|| not_found("Debt", id))?;

        timer.observe_duration();
        Ok(debt)
    }

    /// Returns the image paths of the deleted debt that nothing else uses.
    #[instrument(skip(self))]
    pub async fn delete_debt(&self, scope: Scope, id: Uuid) -> Result<Vec<String>, AppError> {
        let failed = write_failed("delete debt");
        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let images: Vec<String> = sqlx::query_scalar("SELECT image FROM debt_images WHERE debt_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(&failed)?;

        let result = sqlx::query(
            r#"
            DELETE FROM debts t
            USING debtors d
            WHERE t.id = $1 AND d.id = t.debtor_id AND ($2::uuid IS NULL OR d.store_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope.store_id())
        .execute(&mut *tx)
        .await
        .map_err(&failed)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Debt", id));
        }

        let orphaned = unreferenced_images(&mut tx, &images).await.map_err(&failed)?;

        tx.commit().await.map_err(&failed)?;

        info!(debt_id = %id, "Debt deleted");
        Ok(orphaned)
    }

    // ===== Debt Image Operations =====

    #[instrument(skip(self))]
    pub async fn add_debt_image(
        &self,
        scope: Scope,
        debt_id: Uuid,
        image: &str,
    ) -> Result<DebtImage, AppError> {
        self.get_debt(scope, debt_id).await?;

        sqlx::query_as::<_, DebtImage>(
            r#"
            INSERT INTO debt_images (id, debt_id, image)
            VALUES ($1, $2, $3)
            RETURNING id, debt_id, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(debt_id)
        .bind(image)
        .fetch_one(&self.pool)
        .await
        .map_err(write_failed("upload debt image"))
    }

    #[instrument(skip(self))]
    pub async fn list_debt_images(&self, scope: Scope, debt_id: Uuid) -> Result<Vec<DebtImage>, AppError> {
        self.get_debt(scope, debt_id).await?;

        sqlx::query_as::<_, DebtImage>(
            "SELECT id, debt_id, image, created_at FROM debt_images WHERE debt_id = $1 ORDER BY created_at DESC",
        )
        .bind(debt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list debt images"))
    }
}
