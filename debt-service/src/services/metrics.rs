//! Service-level metrics, recorded through the `metrics` facade and exported
//! by the Prometheus recorder installed at startup.

use metrics::{counter, histogram};
use std::time::Instant;

pub const DB_QUERY_DURATION: &str = "debt_db_query_duration_seconds";
pub const PAYMENTS_RECORDED: &str = "debt_payments_recorded_total";
pub const STATISTICS_REQUESTS: &str = "debt_statistics_requests_total";

/// Measures one database operation; dropped timers record nothing.
pub struct QueryTimer {
    operation: &'static str,
    started: Instant,
}

impl QueryTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }

    pub fn observe_duration(self) {
        histogram!(DB_QUERY_DURATION, "operation" => self.operation)
            .record(self.started.elapsed().as_secs_f64());
    }
}

pub fn record_payment(payment_type: &'static str) {
    counter!(PAYMENTS_RECORDED, "type" => payment_type).increment(1);
}

pub fn record_statistics_request(kind: &'static str) {
    counter!(STATISTICS_REQUESTS, "kind" => kind).increment(1);
}
