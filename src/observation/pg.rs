#![cfg(feature = "db")]
//! Postgres-backed `ObservationStore` (spec.md §4.3, §6 "Observation rows
//! keyed by `slot_start` (unique)").
//!
//! Grounded on the teacher's `repo::battery_states` insert/query shape,
//! retargeted from a time-series log to a keyed-by-slot upsert, and on
//! `repo::pg`'s pool-holding struct pattern. The cumulative-to-delta
//! conversion lives in a `last_total` row (one-row table) updated inside
//! the same transaction as the observation insert, so both commit
//! atomically (spec.md §5) -- mirroring `MemoryObservationStore`'s
//! single-mutex invariant at the database layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{CumulativeReading, ObservationStore};
use crate::domain::Observation;
use crate::error::{retry_store_transient, PlannerError};

const MAX_PLAUSIBLE_DELTA_KWH: f64 = 1_000.0;

/// Bounded retry attempts for a `StoreTransient` failure before the tick
/// aborts (spec.md §7), matching the teacher's `connect_with_retry` bound.
const MAX_STORE_ATTEMPTS: u32 = 5;

pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ObservationRecord {
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    pv_kwh: f64,
    load_kwh: f64,
    import_kwh: f64,
    export_kwh: f64,
    batt_charge_kwh: f64,
    batt_discharge_kwh: f64,
    water_kwh: f64,
    soc_start_percent: Option<f64>,
    soc_end_percent: Option<f64>,
    import_price: f64,
    export_price: f64,
    quality_flags: Vec<String>,
    recorded_at: DateTime<Utc>,
}

impl From<ObservationRecord> for Observation {
    fn from(r: ObservationRecord) -> Self {
        Observation {
            slot_start: r.slot_start,
            slot_end: r.slot_end,
            pv_kwh: r.pv_kwh,
            load_kwh: r.load_kwh,
            import_kwh: r.import_kwh,
            export_kwh: r.export_kwh,
            batt_charge_kwh: r.batt_charge_kwh,
            batt_discharge_kwh: r.batt_discharge_kwh,
            water_kwh: r.water_kwh,
            soc_start_percent: r.soc_start_percent,
            soc_end_percent: r.soc_end_percent,
            import_price: r.import_price,
            export_price: r.export_price,
            quality_flags: r.quality_flags,
            recorded_at: r.recorded_at,
        }
    }
}

fn field_delta(current: f64, last: f64) -> (f64, bool) {
    if current < last {
        return (0.0, true);
    }
    let delta = current - last;
    if delta > MAX_PLAUSIBLE_DELTA_KWH {
        return (0.0, true);
    }
    (delta, false)
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn record(
        &self,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
        reading: CumulativeReading,
        soc_start_percent: Option<f64>,
        soc_end_percent: Option<f64>,
        import_price: f64,
        export_price: f64,
    ) -> Result<Observation, PlannerError> {
        retry_store_transient("observation.record", MAX_STORE_ATTEMPTS, || async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            if let Some(existing) = sqlx::query_as::<_, ObservationRecord>(
                "SELECT * FROM observations WHERE slot_start = $1",
            )
            .bind(slot_start)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?
            {
                return Ok(existing.into());
            }

            let last_total = sqlx::query_as::<_, (f64, f64, f64, f64, f64, f64, f64)>(
                "SELECT pv_kwh, load_kwh, import_kwh, export_kwh, batt_charge_kwh, \
                 batt_discharge_kwh, water_kwh FROM observation_last_total WHERE id = TRUE \
                 FOR UPDATE",
            )
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            let mut gap = false;
            let (pv_kwh, load_kwh, import_kwh, export_kwh, batt_charge_kwh, batt_discharge_kwh, water_kwh) =
                match last_total {
                    None => (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                    Some((pv, load, import, export, charge, discharge, water)) => {
                        let (pv, g1) = field_delta(reading.pv_kwh, pv);
                        let (load, g2) = field_delta(reading.load_kwh, load);
                        let (import, g3) = field_delta(reading.import_kwh, import);
                        let (export, g4) = field_delta(reading.export_kwh, export);
                        let (charge, g5) = field_delta(reading.batt_charge_kwh, charge);
                        let (discharge, g6) = field_delta(reading.batt_discharge_kwh, discharge);
                        let (water, g7) = field_delta(reading.water_kwh, water);
                        gap = g1 || g2 || g3 || g4 || g5 || g6 || g7;
                        (pv, load, import, export, charge, discharge, water)
                    }
                };

            sqlx::query(
                r#"
                INSERT INTO observation_last_total
                    (id, pv_kwh, load_kwh, import_kwh, export_kwh,
                     batt_charge_kwh, batt_discharge_kwh, water_kwh)
                VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    pv_kwh = EXCLUDED.pv_kwh,
                    load_kwh = EXCLUDED.load_kwh,
                    import_kwh = EXCLUDED.import_kwh,
                    export_kwh = EXCLUDED.export_kwh,
                    batt_charge_kwh = EXCLUDED.batt_charge_kwh,
                    batt_discharge_kwh = EXCLUDED.batt_discharge_kwh,
                    water_kwh = EXCLUDED.water_kwh
                "#,
            )
            .bind(reading.pv_kwh)
            .bind(reading.load_kwh)
            .bind(reading.import_kwh)
            .bind(reading.export_kwh)
            .bind(reading.batt_charge_kwh)
            .bind(reading.batt_discharge_kwh)
            .bind(reading.water_kwh)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            let mut quality_flags = vec!["auto_recorded".to_string()];
            if gap {
                quality_flags.push("sensor_reset".to_string());
            }
            let recorded_at = Utc::now();

            sqlx::query(
                r#"
                INSERT INTO observations
                    (slot_start, slot_end, pv_kwh, load_kwh, import_kwh, export_kwh,
                     batt_charge_kwh, batt_discharge_kwh, water_kwh,
                     soc_start_percent, soc_end_percent, import_price, export_price,
                     quality_flags, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(slot_start)
            .bind(slot_end)
            .bind(pv_kwh)
            .bind(load_kwh)
            .bind(import_kwh)
            .bind(export_kwh)
            .bind(batt_charge_kwh)
            .bind(batt_discharge_kwh)
            .bind(water_kwh)
            .bind(soc_start_percent)
            .bind(soc_end_percent)
            .bind(import_price)
            .bind(export_price)
            .bind(&quality_flags)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            tx.commit()
                .await
                .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;

            Ok(Observation {
                slot_start,
                slot_end,
                pv_kwh,
                load_kwh,
                import_kwh,
                export_kwh,
                batt_charge_kwh,
                batt_discharge_kwh,
                water_kwh,
                soc_start_percent,
                soc_end_percent,
                import_price,
                export_price,
                quality_flags,
                recorded_at,
            })
        })
        .await
    }

    async fn get(&self, slot_start: DateTime<Utc>) -> Result<Option<Observation>, PlannerError> {
        retry_store_transient("observation.get", MAX_STORE_ATTEMPTS, || async {
            let row = sqlx::query_as::<_, ObservationRecord>(
                "SELECT * FROM observations WHERE slot_start = $1",
            )
            .bind(slot_start)
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
    ) -> Result<Vec<Observation>, PlannerError> {
        retry_store_transient("observation.range", MAX_STORE_ATTEMPTS, || async {
            let rows = sqlx::query_as::<_, ObservationRecord>(
                "SELECT * FROM observations WHERE slot_start >= $1 AND slot_start < $2 \
                 ORDER BY slot_start ASC",
            )
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PlannerError::StoreTransient(e.to_string()))?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }
}
