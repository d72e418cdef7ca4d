#![allow(dead_code)]
//! Schedule store (C8): holds the current `ActionSchedule` and performs the
//! merge/stage/swap protocol on every write (spec.md §4.8).
//!
//! Grounded on the teacher's `controller::mod::AppState::{get_schedule,
//! set_schedule}` (`Arc<RwLock<Option<Schedule>>>`, validate-then-swap), and
//! on `repo::schedules::ScheduleRepository::insert`'s overlap-invalidation
//! transaction -- here generalized from "invalidate overlapping DB rows in
//! one transaction" to "merge historical + future slots into one staged
//! schedule, then swap it into place atomically" so readers never observe a
//! partially-written schedule. `arc_swap::ArcSwap` plays the role the
//! teacher's `RwLock` + transaction played: a single atomic pointer
//! replacement needs no lock for the read path at all.

mod memory;
#[cfg(feature = "db")]
mod pg;

pub use memory::MemorySchedulestore;
#[cfg(feature = "db")]
pub use pg::PgScheduleStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ActionSchedule;
use crate::error::PlannerError;

/// Capability `schedule.read`/`schedule.write`: the schedule store
/// interface shared by the in-memory default and a future Postgres-backed
/// implementation.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Current schedule, if one has ever been written.
    async fn current(&self) -> Option<Arc<ActionSchedule>>;

    /// Merge `projection` with whatever is currently staged (preserving
    /// elapsed slots per I6) and atomically swap it in. Returns the merged
    /// schedule that is now current.
    async fn merge_and_swap(
        &self,
        projection: ActionSchedule,
        now: DateTime<Utc>,
    ) -> Result<Arc<ActionSchedule>, PlannerError>;
}

/// Merge a new projection with the previous schedule: elapsed slots
/// (`start < now`) are copied verbatim from `previous` and flagged
/// historical; slots from `next` at or after `now` are appended as-is
/// (spec.md §4.8 I6). The merged entry list is re-sorted by `start` so slot
/// ordering stays monotonic across regenerations.
pub fn merge_schedules(
    previous: Option<&ActionSchedule>,
    mut next: ActionSchedule,
    now: DateTime<Utc>,
) -> ActionSchedule {
    let Some(previous) = previous else {
        return next;
    };

    let mut historical: Vec<_> = previous
        .entries
        .iter()
        .filter(|e| e.start < now)
        .cloned()
        .map(|mut e| {
            e.is_historical = true;
            e
        })
        .collect();

    next.entries.retain(|e| e.start >= now);
    historical.append(&mut next.entries);
    historical.sort_by_key(|e| e.start);
    next.entries = historical;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Classification, ActionScheduleEntry, ScheduleMeta};
    use chrono::Duration;
    use uuid::Uuid;

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
    fn elapsed_slots_are_preserved_and_flagged_historical() {
        let t0 = Utc::now();
        let previous = ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![entry(t0, false), entry(t0 + Duration::minutes(15), false)],
            meta: ScheduleMeta {
                planned_at: t0,
                planner_version: "v0".into(),
                last_error: None,
            },
        };
        let now = t0 + Duration::minutes(20);
        let next = ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![entry(now, false)],
            meta: ScheduleMeta {
                planned_at: now,
                planner_version: "v1".into(),
                last_error: None,
            },
        };
        let merged = merge_schedules(Some(&previous), next, now);
        assert_eq!(merged.entries.len(), 3);
        assert!(merged.entries[0].is_historical);
        assert!(merged.entries[1].is_historical);
        assert!(!merged.entries[2].is_historical);
        assert_eq!(merged.entries[2].start, now);
    }

    #[test]
    fn no_previous_schedule_passes_next_through() {
        let t0 = Utc::now();
        let next = ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![entry(t0, false)],
            meta: ScheduleMeta {
                planned_at: t0,
                planner_version: "v1".into(),
                last_error: None,
            },
        };
        let merged = merge_schedules(None, next, t0);
        assert_eq!(merged.entries.len(), 1);
        assert!(!merged.entries[0].is_historical);
    }
}
