#![cfg(feature = "db")]
//! Postgres-backed `ForecastStore` (spec.md §4.2, §6 "Persisted state
//! layout": "Forecast rows keyed by `(slot_start, version)`").
//!
//! Grounded on the teacher's `repo::prices`/`repo::pg` query shape, but
//! using `sqlx`'s runtime-checked query API (`query`/`query_as` with
//! `.bind()`) rather than the `query!`/`query_as!` compile-time macros --
//! those require a live database or a checked-in `.sqlx` offline cache at
//! build time, neither of which this crate can assume for every consumer
//! (see DESIGN.md).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::ForecastStore;
use crate::domain::{ForecastRow, ForecastVersion};
use crate::error::{retry_store_transient, PlannerError};

/// Bounded retry attempts for a `StoreTransient` failure before the tick
/// aborts (spec.md §7), matching the teacher's `connect_with_retry` bound.
const MAX_STORE_ATTEMPTS: u32 = 5;

pub struct PgForecastStore {
    pool: PgPool,
}

impl PgForecastStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ForecastRowRecord {
    slot_start: DateTime<Utc>,
    version: String,
    pv_base_kwh: f64,
    load_base_kwh: f64,
    pv_correction_kwh: f64,
    load_correction_kwh: f64,
    pv_p10_kwh: Option<f64>,
    pv_p90_kwh: Option<f64>,
    load_p10_kwh: Option<f64>,
    load_p90_kwh: Option<f64>,
}

impl From<ForecastRowRecord> for ForecastRow {
    fn from(r: ForecastRowRecord) -> Self {
        ForecastRow {
            slot_start: r.slot_start,
            version: ForecastVersion(r.version),
            pv_base_kwh: r.pv_base_kwh,
            load_base_kwh: r.load_base_kwh,
            pv_correction_kwh: r.pv_correction_kwh,
            load_correction_kwh: r.load_correction_kwh,
            pv_p10_kwh: r.pv_p10_kwh,
            pv_p90_kwh: r.pv_p90_kwh,
            load_p10_kwh: r.load_p10_kwh,
            load_p90_kwh: r.load_p90_kwh,
        }
    }
}

#[async_trait]
impl ForecastStore for PgForecastStore {
    /// Write contract (spec.md §4.2): new rows replace any existing row
    /// with the same `(slot_start, forecast_version)` -- expressed as a
    /// Postgres upsert rather than the teacher's delete-then-insert.
    async fn upsert(&self, row: ForecastRow) -> Result<(), PlannerError> {
        retry_store_transient("forecast.upsert", MAX_STORE_ATTEMPTS, || async {
            sqlx::query(
                r#"
                INSERT INTO forecast_rows
                    (slot_start, version, pv_base_kwh, load_base_kwh,
                     pv_correction_kwh, load_correction_kwh,
                     pv_p10_kwh, pv_p90_kwh, load_p10_kwh, load_p90_kwh)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (slot_start, version) DO UPDATE SET
                    pv_base_kwh = EXCLUDED.pv_base_kwh,
                    load_base_kwh = EXCLUDED.load_base_kwh,
                    pv_correction_kwh = EXCLUDED.pv_correction_kwh,
                    load_correction_kwh = EXCLUDED.load_correction_kwh,
                    pv_p10_kwh = EXCLUDED.pv_p10_kwh,
                    pv_p90_kwh = EXCLUDED.pv_p90_kwh,
                    load_p10_kwh = EXCLUDED.load_p10_kwh,
                    load_p90_kwh = EXCLUDED.load_p90_kwh
                "#,
            )
            .bind(row.slot_start)
            .bind(&row.version.0)
            .bind(row.pv_base_kwh)
            .bind(row.load_base_kwh)
            .bind(row.pv_correction_kwh)
            .bind(row.load_correction_kwh)
            .bind(row.pv_p10_kwh)
            .bind(row.pv_p90_kwh)
            .bind(row.load_p10_kwh)
            .bind(row.load_p90_kwh)
            .execute(&self.pool)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn get(
        &self,
        slot_start: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Option<ForecastRow>, PlannerError> {
        retry_store_transient("forecast.get", MAX_STORE_ATTEMPTS, || async {
            let row = sqlx::query_as::<_, ForecastRowRecord>(
                r#"
                SELECT slot_start, version, pv_base_kwh, load_base_kwh,
                       pv_correction_kwh, load_correction_kwh,
                       pv_p10_kwh, pv_p90_kwh, load_p10_kwh, load_p90_kwh
                FROM forecast_rows
                WHERE slot_start = $1 AND version = $2
                "#,
            )
            .bind(slot_start)
            .bind(&version.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        version: &ForecastVersion,
    ) -> Result<Vec<ForecastRow>, PlannerError> {
        retry_store_transient("forecast.range", MAX_STORE_ATTEMPTS, || async {
            let rows = sqlx::query_as::<_, ForecastRowRecord>(
                r#"
                SELECT slot_start, version, pv_base_kwh, load_base_kwh,
                       pv_correction_kwh, load_correction_kwh,
                       pv_p10_kwh, pv_p90_kwh, load_p10_kwh, load_p90_kwh
                FROM forecast_rows
                WHERE slot_start >= $1 AND slot_start < $2 AND version = $3
                ORDER BY slot_start ASC
                "#,
            )
            .bind(from)
            .bind(to)
            .bind(&version.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }
}
