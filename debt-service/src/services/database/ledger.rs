use super::{db_error, Database};
use crate::services::metrics::QueryTimer;
use crate::services::statistics::{DebtLedger, DebtorLedger, PaymentEntry, StoreLedger};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct LedgerRow {
    debtor_id: Uuid,
    full_name: String,
    debt_id: Option<Uuid>,
    debt_sum: Option<Decimal>,
    month_sum: Option<Decimal>,
    debt_period: Option<i32>,
    debt_date: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    debt_id: Uuid,
    sum: Decimal,
}

impl Database {
    // ===== Ledger Operations =====

    /// Store → debtors → debts → payments. An unknown store yields an empty ledger.
    #[instrument(skip(self))]
    pub async fn load_store_ledger(&self, store_id: Uuid) -> Result<StoreLedger, AppError> {
        let timer = QueryTimer::start("load_store_ledger");

        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT d.id AS debtor_id, d.full_name,
                   t.id AS debt_id, t.debt_sum, t.month_sum, t.debt_period, t.debt_date
            FROM debtors d
            LEFT JOIN debts t ON t.debtor_id = d.id
            WHERE d.store_id = $1
            ORDER BY d.created_at, d.id, t.debt_date
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load store ledger"))?;

        let payments = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT p.debt_id, p.sum
            FROM payments p
            JOIN debts t ON t.id = p.debt_id
            JOIN debtors d ON d.id = t.debtor_id
            WHERE d.store_id = $1
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load store payments"))?;

        timer.observe_duration();
        Ok(assemble_ledger(rows, payments))
    }

    #[instrument(skip(self, full_name))]
    pub async fn load_debtor_ledger(
        &self,
        debtor_id: Uuid,
        full_name: String,
    ) -> Result<DebtorLedger, AppError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT $1::uuid AS debtor_id, $2::text AS full_name,
                   t.id AS debt_id, t.debt_sum, t.month_sum, t.debt_period, t.debt_date
            FROM debts t
            WHERE t.debtor_id = $1
            ORDER BY t.debt_date
            "#,
        )
        .bind(debtor_id)
        .bind(&full_name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load debtor ledger"))?;

        let payments = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT p.debt_id, p.sum
            FROM payments p
            JOIN debts t ON t.id = p.debt_id
            WHERE t.debtor_id = $1
            "#,
        )
        .bind(debtor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load debtor payments"))?;

        let ledger = assemble_ledger(rows, payments);
        Ok(ledger.debtors.into_iter().next().unwrap_or(DebtorLedger {
            id: debtor_id,
            full_name,
            debts: Vec::new(),
        }))
    }

    #[instrument(skip(self))]
    pub async fn count_store_debtors(&self, store_id: Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM debtors WHERE store_id = $1")
            .bind(store_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count store debtors"))
    }

    #[instrument(skip(self))]
    pub async fn sum_store_debts(&self, store_id: Uuid) -> Result<Decimal, AppError> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(t.debt_sum), 0)
            FROM debts t
            JOIN debtors d ON d.id = t.debtor_id
            WHERE d.store_id = $1
            "#,
        )
        .bind(store_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("sum store debts"))
    }
}

/// Groups flat rows into the nested ledger, keeping row order.
fn assemble_ledger(rows: Vec<LedgerRow>, payments: Vec<PaymentRow>) -> StoreLedger {
    let mut payments_by_debt: HashMap<Uuid, Vec<PaymentEntry>> = HashMap::new();
    for p in payments {
        payments_by_debt
            .entry(p.debt_id)
            .or_default()
            .push(PaymentEntry { sum: p.sum });
    }

    let mut debtors: Vec<DebtorLedger> = Vec::new();
    for row in rows {
        if debtors.last().map(|d| d.id) != Some(row.debtor_id) {
            debtors.push(DebtorLedger {
                id: row.debtor_id,
                full_name: row.full_name.clone(),
                debts: Vec::new(),
            });
        }

        let (Some(id), Some(debt_sum), Some(month_sum), Some(debt_period), Some(debt_date)) = (
            row.debt_id,
            row.debt_sum,
            row.month_sum,
            row.debt_period,
            row.debt_date,
        ) else {
            continue;
        };

        if let Some(debtor) = debtors.last_mut() {
            debtor.debts.push(DebtLedger {
                id,
                debt_sum,
                month_sum,
                debt_period,
                debt_date,
                payments: payments_by_debt.remove(&id).unwrap_or_default(),
            });
        }
    }

    StoreLedger { debtors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(debtor_id: Uuid, name: &str, debt_id: Option<Uuid>) -> LedgerRow {
        LedgerRow {
            debtor_id,
            full_name: name.to_string(),
            debt_id,
            debt_sum: debt_id.map(|_| Decimal::from(600)),
            month_sum: debt_id.map(|_| Decimal::from(100)),
            debt_period: debt_id.map(|_| 6),
            debt_date: debt_id.map(|_| Utc::now()),
        }
    }

    #[test]
    fn groups_rows_per_debtor_and_attaches_payments() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (d1, d2) = (Uuid::new_v4(), Uuid::new_v4());

        let rows = vec![
            row(alice, "Alice", Some(d1)),
            row(alice, "Alice", Some(d2)),
            row(bob, "Bob", None),
        ];
        let payments = vec![
            PaymentRow {
                debt_id: d1,
                sum: Decimal::from(50),
            },
            PaymentRow {
                debt_id: d1,
                sum: Decimal::from(25),
            },
        ];

        let ledger = assemble_ledger(rows, payments);

        assert_eq!(ledger.debtors.len(), 2);
        assert_eq!(ledger.debtors[0].debts.len(), 2);
        assert_eq!(ledger.debtors[0].debts[0].total_paid(), Decimal::from(75));
        assert!(ledger.debtors[0].debts[1].payments.is_empty());
        assert!(ledger.debtors[1].debts.is_empty());
    }
}
