use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{merge_schedules, ScheduleStore};
use crate::domain::ActionSchedule;
use crate::error::PlannerError;

/// In-process schedule store. `ArcSwapOption` gives readers a lock-free
/// snapshot of the current schedule; writers merge-then-swap under a
/// serializing mutex so concurrent `merge_and_swap` calls don't race each
/// other's read-modify-write (spec.md §5 "the schedule store serializes
/// writers").
#[derive(Default)]
pub struct MemorySchedulestore {
    current: ArcSwapOption<ActionSchedule>,
    write_lock: tokio::sync::Mutex<()>,
}

#[async_trait]
impl ScheduleStore for MemorySchedulestore {
    async fn current(&self) -> Option<Arc<ActionSchedule>> {
        self.current.load_full()
    }

    async fn merge_and_swap(
        &self,
        projection: ActionSchedule,
        now: DateTime<Utc>,
    ) -> Result<Arc<ActionSchedule>, PlannerError> {
        let _guard = self.write_lock.lock().await;
        let previous = self.current.load_full();
        let merged = Arc::new(merge_schedules(previous.as_deref(), projection, now));
        self.current.store(Some(merged.clone()));
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionScheduleEntry, Classification, ScheduleMeta};
    use chrono::Duration;
    use uuid::Uuid;

    fn schedule(t0: DateTime<Utc>) -> ActionSchedule {
        ActionSchedule {
            id: Uuid::new_v4(),
            entries: vec![ActionScheduleEntry {
                start: t0,
                end: t0 + Duration::minutes(15),
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
                load_forecast_kwh: 0.0,
                is_historical: false,
            }],
            meta: ScheduleMeta {
                planned_at: t0,
                planner_version: "v0".into(),
                last_error: None,
            },
        }
    }

    #[tokio::test]
    async fn current_is_none_before_first_write() {
        let store = MemorySchedulestore::default();
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn merge_and_swap_publishes_atomically() {
        let store = MemorySchedulestore::default();
        let t0 = Utc::now();
        let published = store.merge_and_swap(schedule(t0), t0).await.unwrap();
        assert_eq!(published.entries.len(), 1);
        let current = store.current().await.unwrap();
        assert_eq!(current.id, published.id);
    }
}
