pub mod logging;

pub use logging::{init_metrics_recorder, init_tracing};
