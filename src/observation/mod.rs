#![allow(dead_code)]
//! Observation store (C3): append-only realized per-slot records derived
//! from cumulative-energy sensor deltas (spec.md §4.3, §5).

mod memory;
#[cfg(feature = "db")]
mod pg;

pub use memory::MemoryObservationStore;
#[cfg(feature = "db")]
pub use pg::PgObservationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Observation;
use crate::error::PlannerError;

/// A single cumulative-counter read from the live sensors (spec.md §6
/// "Live sensors"). All fields are running totals, never per-slot deltas --
/// the store derives deltas by diffing against the last-seen total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CumulativeReading {
    pub pv_kwh: f64,
    pub load_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub batt_charge_kwh: f64,
    pub batt_discharge_kwh: f64,
    pub water_kwh: f64,
}

/// Capability `observation.record`: append-only observation persistence
/// with the cumulative-to-delta conversion baked in (grounded on the
/// teacher's `repo::battery_states` insert/cleanup shape, retargeted from a
/// time-series log to a keyed-by-slot record store).
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Record a slot's realized reading. Implementations must derive each
    /// field's delta as `max(0, current - last_total)`, commit the new
    /// `last_total` atomically with the delta (spec.md §5), and treat a
    /// repeated call for the same `slot_start` as a no-op that returns the
    /// row already on file (spec.md P8).
    async fn record(
        &self,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        reading: CumulativeReading,
        soc_start_percent: Option<f64>,
        soc_end_percent: Option<f64>,
        import_price: f64,
        export_price: f64,
    ) -> Result<Observation, PlannerError>;

    async fn get(&self, slot_start: DateTime<Utc>) -> Result<Option<Observation>, PlannerError>;

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, PlannerError>;
}
