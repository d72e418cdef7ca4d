use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A realized, per-slot record derived from sensor deltas (spec.md §3
/// "Observation"). Append-only; at most one per `slot_start` with a
/// non-null `soc_end_percent` (spec.md §4.3).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub pv_kwh: f64,
    pub load_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub batt_charge_kwh: f64,
    pub batt_discharge_kwh: f64,
    pub water_kwh: f64,
    pub soc_start_percent: Option<f64>,
    pub soc_end_percent: Option<f64>,
    pub import_price: f64,
    pub export_price: f64,
    pub quality_flags: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Observation {
    pub fn tag(&mut self, flag: &str) {
        if !self.quality_flags.iter().any(|f| f == flag) {
            self.quality_flags.push(flag.to_string());
        }
    }

    pub fn is_battery_masked(&self) -> bool {
        self.quality_flags.iter().any(|f| f == "mask_battery")
    }
}
