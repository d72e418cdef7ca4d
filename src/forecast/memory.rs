use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::ForecastStore;
use crate::domain::{ForecastRow, ForecastVersion};
use crate::error::PlannerError;

type Key = (DateTime<Utc>, ForecastVersion);

/// In-process forecast store backed by a `parking_lot::RwLock<HashMap<..>>`.
/// This is the default store (no `db` feature required) -- same role as
/// the teacher's simulated-hardware default mode, but for storage rather
/// than hardware.
#[derive(Default)]
pub struct MemoryForecastStore {
    rows: RwLock<HashMap<Key, ForecastRow>>,
}

#[async_trait]
impl ForecastStore for MemoryForecastStore {
    async fn upsert(&self, row: ForecastRow) -> Result<(), PlannerError> {
        let key = (row.slot_start, row.version.clone());
        self.rows.write().insert(key, row);
        Ok(())
    }

    async fn get(
        &self,
        slot_start: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Option<ForecastRow>, PlannerError> {
        Ok(self.rows.read().get(&(slot_start, version.clone())).cloned())
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Vec<ForecastRow>, PlannerError> {
        let mut out: Vec<ForecastRow> = self
            .rows
            .read()
            .iter()
            .filter(|((start, v), _)| *start >= from && *start < to && v == version)
            .map(|(_, row)| row.clone())
            .collect();
        out.sort_by_key(|r| r.slot_start);
        Ok(out)
    }
}
