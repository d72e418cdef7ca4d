#![allow(dead_code)]
//! Forecast store (C2): per-slot PV/load forecasts plus p10/p90 and
//! correction deltas, versioned (spec.md §4.2).

mod memory;
mod naive;
#[cfg(feature = "db")]
mod pg;

pub use memory::MemoryForecastStore;
pub use naive::NaiveForecaster;
#[cfg(feature = "db")]
pub use pg::PgForecastStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ForecastRow, ForecastVersion};
use crate::error::PlannerError;

/// Capability `forecast.read`/write: the forecast store interface shared by
/// the in-memory default and the optional Postgres-backed implementation
/// (grounded on the teacher's `forecast::engine::ForecastEngine` composing
/// trait-object collaborators).
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Write contract (spec.md §4.2): new rows replace any existing row with
    /// the same `(slot_start, forecast_version)`.
    async fn upsert(&self, row: ForecastRow) -> Result<(), PlannerError>;

    async fn get(
        &self,
        slot_start: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Option<ForecastRow>, PlannerError>;

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Vec<ForecastRow>, PlannerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_existing_row_for_same_key() {
        let store = MemoryForecastStore::default();
        let version = ForecastVersion::naive();
        let t = Utc::now();
        store
            .upsert(ForecastRow {
                slot_start: t,
                version: version.clone(),
                pv_base_kwh: 1.0,
                load_base_kwh: 0.5,
                pv_correction_kwh: 0.0,
                load_correction_kwh: 0.0,
                pv_p10_kwh: None,
                pv_p90_kwh: None,
                load_p10_kwh: None,
                load_p90_kwh: None,
            })
            .await
            .unwrap();
        store
            .upsert(ForecastRow {
                slot_start: t,
                version: version.clone(),
                pv_base_kwh: 2.0,
                load_base_kwh: 0.7,
                pv_correction_kwh: 0.1,
                load_correction_kwh: 0.0,
                pv_p10_kwh: None,
                pv_p90_kwh: None,
                load_p10_kwh: None,
                load_p90_kwh: None,
            })
            .await
            .unwrap();

        let row = store.get(t, &version).await.unwrap().unwrap();
        assert_eq!(row.pv_base_kwh, 2.0);
        assert!((row.effective_pv_kwh() - 2.1).abs() < 1e-9);
    }
}
