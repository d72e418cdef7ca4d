#![cfg(feature = "db")]
//! Postgres-backed `ScheduleStore` (spec.md §4.8, §6 "Schedule: current
//! snapshot + append-only history of `(planned_at, planner_version,
//! slot_start, ...)` for auditability").
//!
//! Grounded on the teacher's `repo::schedules::ScheduleRepository::insert`
//! overlap-invalidation transaction, generalized from "invalidate
//! overlapping rows" to "merge historical + future slots into one staged
//! schedule, then mark it current in the same transaction that inserts the
//! audit row" -- the DB-level analogue of `MemorySchedulestore`'s
//! `ArcSwap`-based publish.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{merge_schedules, ScheduleStore};
use crate::domain::ActionSchedule;
use crate::error::{retry_store_transient, PlannerError};

/// Bounded retry attempts for a `StoreTransient` failure before the tick
/// aborts (spec.md §7), matching the teacher's `connect_with_retry` bound.
const MAX_STORE_ATTEMPTS: u32 = 5;

pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn current(&self) -> Option<Arc<ActionSchedule>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT payload FROM schedule_snapshots WHERE is_current = TRUE LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten();
        row.and_then(|(payload,)| serde_json::from_value(payload).ok())
            .map(Arc::new)
    }

    async fn merge_and_swap(
        &self,
        projection: ActionSchedule,
        now: DateTime<Utc>,
    ) -> Result<Arc<ActionSchedule>, PlannerError> {
        retry_store_transient("schedule.merge_and_swap", MAX_STORE_ATTEMPTS, || async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            let previous_row: Option<(serde_json::Value,)> = sqlx::query_as(
                "SELECT payload FROM schedule_snapshots WHERE is_current = TRUE FOR UPDATE",
            )
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;
            let previous: Option<ActionSchedule> = previous_row
                .and_then(|(payload,)| serde_json::from_value(payload).ok());

            let merged = merge_schedules(previous.as_ref(), projection.clone(), now);
            let payload = serde_json::to_value(&merged)
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            sqlx::query("UPDATE schedule_snapshots SET is_current = FALSE WHERE is_current = TRUE")
                .execute(&mut *tx)
                .await
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO schedule_snapshots
                    (id, planned_at, planner_version, is_current, payload)
                VALUES ($1, $2, $3, TRUE, $4)
                "#,
            )
            .bind(merged.id)
            .bind(merged.meta.planned_at)
            .bind(&merged.meta.planner_version)
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            tx.commit()
                .await
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            Ok(Arc::new(merged))
        })
        .await
    }
}
