use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Per-slot action classification used by downstream executors and by the
/// `soc_target_percent` derivation rules (spec.md §4.7).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Charge,
    Discharge,
    Export,
    Hold,
    PvCharge,
}

/// One slot of the action schedule consumed by the executor (spec.md §3
/// "ActionSchedule").
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionScheduleEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub battery_charge_kw: f64,
    pub battery_discharge_kw: f64,
    pub grid_import_kw: f64,
    pub grid_export_kw: f64,
    pub water_heating_kw: f64,
    pub projected_soc_percent: f64,
    pub soc_target_percent: f64,
    pub classification: Classification,
    pub import_price: f64,
    pub export_price: f64,
    pub pv_forecast_kwh: f64,
    pub load_forecast_kwh: f64,
    pub is_historical: bool,
}

/// Bookkeeping attached to a persisted schedule (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMeta {
    pub planned_at: DateTime<Utc>,
    pub planner_version: String,
    pub last_error: Option<String>,
}

/// The persisted, per-slot schedule handed to the executor (spec.md §3
/// "ActionSchedule", plural form as stored by C8).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchedule {
    pub id: Uuid,
    pub entries: Vec<ActionScheduleEntry>,
    pub meta: ScheduleMeta,
}

impl ActionSchedule {
    pub fn slot_at(&self, t: DateTime<Utc>) -> Option<&ActionScheduleEntry> {
        self.entries
            .iter()
            .find(|e| t >= e.start && t < e.end)
    }

    /// Entries whose `start` has not yet elapsed relative to `now`.
    pub fn future_entries(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ActionScheduleEntry> {
        self.entries.iter().filter(move |e| e.start >= now)
    }

    /// Entries strictly before `now` -- candidates for historical preservation
    /// (spec.md I6/§4.8).
    pub fn historical_entries(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ActionScheduleEntry> {
        self.entries.iter().filter(move |e| e.start < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(start: DateTime<Utc>, historical: bool) -> ActionScheduleEntry {
        ActionScheduleEntry {
            start,
            end: start + Duration::minutes(15),
            battery_charge_kw: 0.0,
            battery_discharge_kw: 0.0,
            grid_import_kw: 0.0,
            grid_export_kw: 0.0,
            water_heating_kw: 0.0,
            projected_soc_percent: 50.0,
            soc_target_percent: 50.0,
            classification: Classification::Hold,
            import_price: 0.1,
            export_price: 0.05,
            pv_forecast_kwh: 0.0,
            load_forecast_kwh: 0.1,
            is_historical: historical,
        }
    }

    #[test]
    fn slot_at_finds_containing_entry() {
        let t0 = Utc::now();
        let schedule = ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![entry(t0, false), entry(t0 + Duration::minutes(15), false)],
            meta: ScheduleMeta {
                planned_at: t0,
                planner_version: "test".into(),
                last_error: None,
            },
        };
        let found = schedule.slot_at(t0 + Duration::minutes(20)).unwrap();
        assert_eq!(found.start, t0 + Duration::minutes(15));
    }

    #[test]
    fn historical_and_future_partition_on_now() {
        let t0 = Utc::now();
        let schedule = ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![entry(t0, true), entry(t0 + Duration::minutes(15), false)],
            meta: ScheduleMeta {
                planned_at: t0,
                planner_version: "test".into(),
                last_error: None,
            },
        };
        let now = t0 + Duration::minutes(15);
        assert_eq!(schedule.historical_entries(now).count(), 1);
        assert_eq!(schedule.future_entries(now).count(), 1);
    }
}
