use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deferrable-load configuration for an optional resistive water heater
/// (spec.md §3 "WaterHeater").
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterHeaterConfig {
    pub power_kw: f64,
    pub min_kwh_per_day: f64,
    pub max_gap_hours: f64,
    pub min_spacing_hours: f64,
    /// Allows "today's" requirement to extend into early next day.
    pub defer_up_to_hours: f64,
    /// Energy already delivered today, subtracted from day-0's requirement.
    pub heated_today_kwh: f64,
    /// Slots the operator or a previous plan has locked to "on"
    /// (spec.md §4.6 "Forced ON slots").
    #[serde(default)]
    pub locked_on_slots: Vec<DateTime<Utc>>,
}

impl WaterHeaterConfig {
    /// Day-0 requirement after crediting `heated_today_kwh`, clamped at 0
    /// (spec.md §4.6).
    pub fn day_zero_requirement_kwh(&self) -> f64 {
        (self.min_kwh_per_day - self.heated_today_kwh).max(0.0)
    }
}
