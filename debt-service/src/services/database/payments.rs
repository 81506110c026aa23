use super::{db_error, not_found, write_failed, Database, Scope};
use crate::models::{Payment, PaymentType};
use crate::services::metrics::{record_payment, QueryTimer};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "p.id, p.debt_id, p.sum, p.date, p.type, p.created_at, p.updated_at";

/// Joins that tie a payment back to the owning store, filtered by `$n`.
const PAYMENT_SCOPE_JOIN: &str =
    "JOIN debts t ON t.id = p.debt_id JOIN debtors d ON d.id = t.debtor_id";

#[derive(Debug, Default)]
pub struct PaymentChanges {
    pub sum: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
    pub payment_type: Option<PaymentType>,
}

impl Database {
    // ===== Payment Operations =====

    /// Locks the debt row while the payment is recorded.
    #[instrument(skip(self), fields(debt_id = %debt_id))]
    pub async fn create_payment(
        &self,
        scope: Scope,
        debt_id: Uuid,
        sum: Decimal,
        date: DateTime<Utc>,
        payment_type: PaymentType,
    ) -> Result<Payment, AppError> {
        let timer = QueryTimer::start("create_payment");
        let failed = write_failed("create payment");

        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let debt_exists: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT t.id FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE t.id = $1 AND ($2::uuid IS NULL OR d.store_id = $2)
            FOR UPDATE OF t
            "#,
        )
        .bind(debt_id)
        .bind(scope.store_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(&failed)?;

        if debt_exists.is_none() {
            return Err(not_found("Debt", debt_id));
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments AS p (id, debt_id, sum, date, type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(debt_id)
        .bind(sum)
        .bind(date)
        .bind(payment_type.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(&failed)?;

        tx.commit().await.map_err(&failed)?;

        timer.observe_duration();
        record_payment(payment_type.as_str());
        info!(payment_id = %payment.id, sum = %payment.sum, "Payment recorded");

        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        scope: Scope,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), AppError> {
        let timer = QueryTimer::start("list_payments");

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments p {PAYMENT_SCOPE_JOIN}
            WHERE ($1::uuid IS NULL OR d.store_id = $1)
            ORDER BY p.date DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(scope.store_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payments"))?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM payments p {PAYMENT_SCOPE_JOIN} WHERE ($1::uuid IS NULL OR d.store_id = $1)"
        ))
        .bind(scope.store_id())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count payments"))?;

        timer.observe_duration();
        Ok((payments, total))
    }

    #[instrument(skip(self))]
    pub async fn get_payment(&self, scope: Scope, id: Uuid) -> Result<Payment, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments p {PAYMENT_SCOPE_JOIN}
            WHERE p.id = $1 AND ($2::uuid IS NULL OR d.store_id = $2)
            "#
        ))
        .bind(id)
        .bind(scope.store_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get payment"))?
        .ok_or_else(|| not_found("Payment", id))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_payment(
        &self,
        scope: Scope,
        id: Uuid,
        changes: PaymentChanges,
    ) -> Result<Payment, AppError> {
        let timer = QueryTimer::start("update_payment");
        let failed = write_failed("update payment");

        let mut tx = self.pool.begin().await.map_err(&failed)?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments AS p SET
                sum = COALESCE($3, p.sum),
                date = COALESCE($4, p.date),
                type = COALESCE($5, p.type),
                updated_at = NOW()
            FROM debts t JOIN debtors d ON d.id = t.debtor_id
            WHERE p.id = $1 AND t.id = p.debt_id AND ($2::uuid IS NULL OR d.store_id = $2)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scope.store_id())
        .bind(changes.sum)
        .bind(changes.date)
        .bind(changes.payment_type.map(|t| t.as_str()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(&failed)?
        .ok_or_else(|| not_found("Payment", id))?;

        tx.commit().await.map_err(&failed)?;

        timer.observe_duration();
        info!(payment_id = %id, "Payment updated");

        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn update_payment_type(
        &self,
        scope: Scope,
        id: Uuid,
        payment_type: PaymentType,
    ) -> Result<Payment, AppError> {
        self.update_payment(
            scope,
            id,
            PaymentChanges {
                payment_type: Some(payment_type),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_payments_by_type(
        &self,
        scope: Scope,
        payment_type: PaymentType,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments p {PAYMENT_SCOPE_JOIN}
            WHERE p.type = $1 AND ($2::uuid IS NULL OR d.store_id = $2)
            ORDER BY p.date DESC
            "#
        ))
        .bind(payment_type.as_str())
        .bind(scope.store_id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payments by type"))
    }

    #[instrument(skip(self))]
    pub async fn list_payments_by_debt(&self, scope: Scope, debt_id: Uuid) -> Result<Vec<Payment>, AppError> {
        self.get_debt(scope, debt_id).await?;

        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.debt_id = $1 ORDER BY p.date"
        ))
        .bind(debt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payments by debt"))
    }

    #[instrument(skip(self))]
    pub async fn delete_payments_by_debt(&self, scope: Scope, debt_id: Uuid) -> Result<u64, AppError> {
        self.get_debt(scope, debt_id).await?;

        let result = sqlx::query("DELETE FROM payments WHERE debt_id = $1")
            .bind(debt_id)
            .execute(&self.pool)
            .await
            .map_err(write_failed("delete payments"))?;

        info!(debt_id = %debt_id, deleted = result.rows_affected(), "Payments deleted");
        Ok(result.rows_affected())
    }

    /// Payments dated within `[start, end]`.
    #[instrument(skip(self))]
    pub async fn list_payments_between(
        &self,
        scope: Scope,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments p {PAYMENT_SCOPE_JOIN}
            WHERE p.date BETWEEN $1 AND $2 AND ($3::uuid IS NULL OR d.store_id = $3)
            ORDER BY p.date
            "#
        ))
        .bind(start)
        .bind(end)
        .bind(scope.store_id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list payments between dates"))
    }
}
