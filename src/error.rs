#![allow(dead_code)]
//! Error taxonomy for the planning subsystem.
//!
//! Every fallible boundary in this crate returns `PlannerError` rather than
//! panicking; the orchestrator converts these into schedule metadata rather
//! than crashing the process (see `orchestrator::tick`).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("tariff unavailable: {0}")]
    TariffUnavailable(String),

    #[error("forecast missing for slot {slot_start}")]
    ForecastMissing { slot_start: chrono::DateTime<chrono::Utc> },

    #[error("state of charge unavailable: {0}")]
    SoCUnavailable(String),

    #[error("solver reported infeasible problem")]
    SolverInfeasible,

    #[error("solver timed out after {0}ms")]
    SolverTimeout(u64),

    #[error("solver error: {0}")]
    SolverError(String),

    #[error("store I/O error: {0}")]
    StoreTransient(String),

    #[error("observation gap for slot {slot_start}: {reason}")]
    ObservationGap {
        slot_start: chrono::DateTime<chrono::Utc>,
        reason: String,
    },
}

impl PlannerError {
    /// Whether this error kind is acceptable to proceed past (§7: ForecastMissing
    /// substitutes a fallback and keeps going; everything else aborts the tick).
    pub fn is_recoverable_inline(&self) -> bool {
        matches!(self, PlannerError::ForecastMissing { .. })
    }
}

/// Bounded exponential-backoff retry for `StoreTransient` failures (spec.md
/// §7: "retried with exponential backoff up to a bounded number of
/// attempts, then the tick aborts"). Any other error kind is returned
/// immediately without retrying.
///
/// Grounded on the teacher's `database::Database::connect_with_retry`
/// (`examples/ZilverZtream-OEC-Open_Energy_Controller/src/database/mod.rs`):
/// an attempt counter plus a delay that starts at `initial_delay` and
/// doubles after every failed attempt.
pub async fn retry_store_transient<T, F, Fut>(op_name: &str, max_attempts: u32, mut op: F) -> Result<T, PlannerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlannerError>>,
{
    let mut attempt = 0u32;
    let mut delay = Duration::from_millis(500);
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(PlannerError::StoreTransient(msg)) if attempt < max_attempts.max(1) => {
                tracing::warn!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    error = %msg,
                    ?delay,
                    "store I/O error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(feature = "db")]
impl From<sqlx::Error> for PlannerError {
    fn from(e: sqlx::Error) -> Self {
        PlannerError::StoreTransient(e.to_string())
    }
}

impl From<validator::ValidationErrors> for PlannerError {
    fn from(e: validator::ValidationErrors) -> Self {
        PlannerError::ConfigInvalid(e.to_string())
    }
}
