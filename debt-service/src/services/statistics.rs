//! Store statistics: installments due in a month, late-debt month counts,
//! the main-menu aggregate and per-debtor balances.
//!
//! The calculations are pure functions over a [`StoreLedger`], the
//! store → debtors → debts → payments graph loaded by the database layer.
//! [`StatisticsService`] wires them to storage.

use crate::services::database::{Database, Scope};
use crate::services::metrics::record_statistics_request;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

/// Length of a "month" when counting how long a debt has been outstanding.
const LATE_MONTH_MILLIS: i64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct PaymentEntry {
    pub sum: Decimal,
}

#[derive(Debug, Clone)]
pub struct DebtLedger {
    pub id: Uuid,
    pub debt_sum: Decimal,
    pub month_sum: Decimal,
    pub debt_period: i32,
    pub debt_date: DateTime<Utc>,
    pub payments: Vec<PaymentEntry>,
}

#[derive(Debug, Clone)]
pub struct DebtorLedger {
    pub id: Uuid,
    pub full_name: String,
    pub debts: Vec<DebtLedger>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreLedger {
    pub debtors: Vec<DebtorLedger>,
}

impl DebtLedger {
    pub fn total_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.sum).sum()
    }

    /// Negative when the debt was overpaid.
    pub fn remaining(&self) -> Decimal {
        self.debt_sum - self.total_paid()
    }

    /// Calendar months from the debt's start month to `reference`'s month.
    pub fn month_offset(&self, reference: NaiveDate) -> i32 {
        let start = self.debt_date.date_naive();
        (reference.year() - start.year()) * 12 + reference.month() as i32 - start.month() as i32
    }

    /// Whether an installment falls in `reference`'s month.
    pub fn is_due_in(&self, reference: NaiveDate) -> bool {
        let offset = self.month_offset(reference);
        offset >= 0 && offset < self.debt_period
    }

    /// Whole 30-day months since the start date; 0 for debts that are paid
    /// off or not yet a month old.
    pub fn late_months(&self, now: DateTime<Utc>) -> i64 {
        if self.remaining() <= Decimal::ZERO {
            return 0;
        }
        let elapsed = (now - self.debt_date).num_milliseconds();
        elapsed.div_euclid(LATE_MONTH_MILLIS).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuePayment {
    pub debtor_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuePayments {
    pub total_amount: Decimal,
    pub due_payments: Vec<DuePayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatePayments {
    pub late_debts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainMenu {
    pub total_debts: Decimal,
    pub debtors_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtorSummary {
    pub debtor_id: Uuid,
    pub total_debt: Decimal,
    pub total_paid: Decimal,
    pub remaining: Decimal,
}

/// One entry per debt whose installment window covers `reference`'s month.
pub fn due_payments(ledger: &StoreLedger, reference: NaiveDate) -> DuePayments {
    let due_payments: Vec<DuePayment> = ledger
        .debtors
        .iter()
        .flat_map(|debtor| {
            debtor
                .debts
                .iter()
                .filter(move |debt| debt.is_due_in(reference))
                .map(move |debt| DuePayment {
                    debtor_name: debtor.full_name.clone(),
                    amount: debt.month_sum,
                })
        })
        .collect();

    DuePayments {
        total_amount: due_payments.iter().map(|p| p.amount).sum(),
        due_payments,
    }
}

/// Sum of elapsed 30-day months over every debt that still has a balance.
pub fn late_payments(ledger: &StoreLedger, now: DateTime<Utc>) -> LatePayments {
    let late_debts = ledger
        .debtors
        .iter()
        .flat_map(|debtor| debtor.debts.iter())
        .map(|debt| debt.late_months(now))
        .sum();

    LatePayments { late_debts }
}

pub fn summarize_debtor(debtor: &DebtorLedger) -> DebtorSummary {
    let total_debt: Decimal = debtor.debts.iter().map(|d| d.debt_sum).sum();
    let total_paid: Decimal = debtor.debts.iter().map(|d| d.total_paid()).sum();

    DebtorSummary {
        debtor_id: debtor.id,
        total_debt,
        total_paid,
        remaining: total_debt - total_paid,
    }
}

/// Loads ledgers and runs the calculations above.
#[derive(Clone)]
pub struct StatisticsService {
    db: Database,
}

impl StatisticsService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn due_payments(&self, store_id: Uuid, reference: NaiveDate) -> Result<DuePayments, AppError> {
        record_statistics_request("due_payments");
        let ledger = self
            .db
            .load_store_ledger(store_id)
            .await
            .map_err(aggregation_failed("due payments"))?;
        Ok(due_payments(&ledger, reference))
    }

    #[instrument(skip(self))]
    pub async fn late_payments(&self, store_id: Uuid) -> Result<LatePayments, AppError> {
        record_statistics_request("late_payments");
        let ledger = self
            .db
            .load_store_ledger(store_id)
            .await
            .map_err(aggregation_failed("late payments"))?;
        Ok(late_payments(&ledger, Utc::now()))
    }

    /// Debtor count and principal total, queried concurrently.
    #[instrument(skip(self))]
    pub async fn main_menu(&self, store_id: Uuid) -> Result<MainMenu, AppError> {
        record_statistics_request("main_menu");
        let (debtors_count, total_debts) = tokio::try_join!(
            self.db.count_store_debtors(store_id),
            self.db.sum_store_debts(store_id),
        )
        .map_err(aggregation_failed("main menu statistics"))?;

        Ok(MainMenu {
            total_debts,
            debtors_count,
        })
    }

    #[instrument(skip(self))]
    pub async fn debtor_summary(&self, scope: Scope, debtor_id: Uuid) -> Result<DebtorSummary, AppError> {
        record_statistics_request("debtor_total");
        let debtor = self.db.get_debtor(scope, debtor_id).await?;
        let ledger = self
            .db
            .load_debtor_ledger(debtor.id, debtor.full_name)
            .await
            .map_err(aggregation_failed("total debt"))?;
        Ok(summarize_debtor(&ledger))
    }
}

/// Read-path failures are reported as 400 with the cause; not-found stays 404.
fn aggregation_failed(what: &'static str) -> impl Fn(AppError) -> AppError {
    move |e| {
        if matches!(e, AppError::NotFound(_)) {
            e
        } else {
            AppError::BadRequest(anyhow::anyhow!("Failed to calculate {}: {}", what, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn debt(debt_sum: i64, month_sum: i64, period: i32, start: DateTime<Utc>, paid: &[i64]) -> DebtLedger {
        DebtLedger {
            id: Uuid::new_v4(),
            debt_sum: Decimal::from(debt_sum),
            month_sum: Decimal::from(month_sum),
            debt_period: period,
            debt_date: start,
            payments: paid
                .iter()
                .map(|s| PaymentEntry {
                    sum: Decimal::from(*s),
                })
                .collect(),
        }
    }

    fn store(debtors: Vec<(&str, Vec<DebtLedger>)>) -> StoreLedger {
        StoreLedger {
            debtors: debtors
                .into_iter()
                .map(|(name, debts)| DebtorLedger {
                    id: Uuid::new_v4(),
                    full_name: name.to_string(),
                    debts,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_store_has_nothing_due() {
        let result = due_payments(&StoreLedger::default(), day(2024, 3, 1));
        assert_eq!(result.total_amount, Decimal::ZERO);
        assert!(result.due_payments.is_empty());

        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body["duePayments"], serde_json::json!([]));
        assert!(body.get("totalAmount").is_some());
    }

    #[test]
    fn installment_window_covers_period_months() {
        let d = debt(600, 100, 6, at(2024, 1, 15), &[]);

        assert_eq!(d.month_offset(day(2024, 3, 1)), 2);
        assert!(d.is_due_in(day(2024, 3, 1)));
        assert!(d.is_due_in(day(2024, 1, 31)));
        assert!(d.is_due_in(day(2024, 6, 30)));

        assert_eq!(d.month_offset(day(2024, 8, 1)), 7);
        assert!(!d.is_due_in(day(2024, 7, 1)));
        assert!(!d.is_due_in(day(2024, 8, 1)));
        assert!(!d.is_due_in(day(2023, 12, 31)));
    }

    #[test]
    fn month_offset_crosses_year_boundary() {
        let d = debt(1200, 100, 12, at(2023, 11, 1), &[]);
        assert_eq!(d.month_offset(day(2024, 2, 10)), 3);
        assert!(d.is_due_in(day(2024, 10, 1)));
        assert!(!d.is_due_in(day(2024, 11, 1)));
    }

    #[test]
    fn due_payments_lists_each_due_debt() {
        let ledger = store(vec![
            (
                "Alice",
                vec![
                    debt(600, 100, 6, at(2024, 1, 5), &[]),
                    debt(300, 150, 2, at(2023, 6, 5), &[]),
                ],
            ),
            ("Bob", vec![debt(1000, 250, 4, at(2024, 2, 1), &[250])]),
        ]);

        let result = due_payments(&ledger, day(2024, 3, 15));

        assert_eq!(
            result.due_payments,
            vec![
                DuePayment {
                    debtor_name: "Alice".to_string(),
                    amount: Decimal::from(100),
                },
                DuePayment {
                    debtor_name: "Bob".to_string(),
                    amount: Decimal::from(250),
                },
            ]
        );
        assert_eq!(result.total_amount, Decimal::from(350));
    }

    #[test]
    fn fully_paid_debt_is_never_late() {
        let ledger = store(vec![("Alice", vec![debt(500, 100, 5, at(2023, 1, 1), &[300, 200])])]);
        assert_eq!(late_payments(&ledger, at(2024, 6, 1)).late_debts, 0);
    }

    #[test]
    fn overpaid_debt_is_never_late() {
        let d = debt(500, 100, 5, at(2023, 1, 1), &[600]);
        assert!(d.remaining() < Decimal::ZERO);
        assert_eq!(d.late_months(at(2024, 6, 1)), 0);
    }

    #[test]
    fn late_months_use_thirty_day_buckets() {
        let start = at(2024, 1, 1);
        let d = debt(500, 100, 5, start, &[100]);

        assert_eq!(d.late_months(start + chrono::Duration::days(29)), 0);
        assert_eq!(d.late_months(start + chrono::Duration::days(30)), 1);
        assert_eq!(d.late_months(start + chrono::Duration::days(95)), 3);
        assert_eq!(d.late_months(start - chrono::Duration::days(10)), 0);
    }

    #[test]
    fn late_payments_sum_months_across_debts() {
        let now = at(2024, 4, 10);
        let ledger = store(vec![
            ("Alice", vec![debt(500, 100, 5, now - chrono::Duration::days(65), &[])]),
            (
                "Bob",
                vec![
                    debt(300, 100, 3, now - chrono::Duration::days(31), &[50]),
                    debt(300, 100, 3, now - chrono::Duration::days(200), &[300]),
                ],
            ),
        ]);

        let result = late_payments(&ledger, now);
        assert_eq!(result.late_debts, 3);
        assert_eq!(serde_json::to_value(&result).unwrap(), serde_json::json!({"lateDebts": 3}));
    }

    #[test]
    fn debtor_summary_totals_debts_and_payments() {
        let debtor = DebtorLedger {
            id: Uuid::new_v4(),
            full_name: "Alice".to_string(),
            debts: vec![
                debt(600, 100, 6, at(2024, 1, 1), &[100, 50]),
                debt(400, 200, 2, at(2024, 2, 1), &[]),
            ],
        };

        let summary = summarize_debtor(&debtor);
        assert_eq!(summary.total_debt, Decimal::from(1000));
        assert_eq!(summary.total_paid, Decimal::from(150));
        assert_eq!(summary.remaining, Decimal::from(850));
    }

    #[test]
    fn debtor_without_debts_owes_nothing() {
        let debtor = DebtorLedger {
            id: Uuid::new_v4(),
            full_name: "Carol".to_string(),
            debts: vec![],
        };
        let summary = summarize_debtor(&debtor);
        assert_eq!(summary.remaining, Decimal::ZERO);
    }

    #[test]
    fn main_menu_serializes_snake_case() {
        let menu = MainMenu {
            total_debts: Decimal::ZERO,
            debtors_count: 0,
        };
        let body = serde_json::to_value(&menu).unwrap();
        assert_eq!(body["debtors_count"], 0);
        assert!(body.get("total_debts").is_some());
    }
}
