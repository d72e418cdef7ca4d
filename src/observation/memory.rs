use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{CumulativeReading, ObservationStore};
use crate::domain::Observation;
use crate::error::PlannerError;

/// A single slot's worth of cumulative energy is never expected to exceed
/// this; a larger jump is treated the same as a counter reset rather than
/// trusted as real consumption (spec.md §7 ObservationGap).
const MAX_PLAUSIBLE_DELTA_KWH: f64 = 1_000.0;

struct Inner {
    rows: HashMap<DateTime<Utc>, Observation>,
    last_total: Option<CumulativeReading>,
}

/// In-process observation store. The delta computation and the
/// `last_total` baseline update are both performed under the same lock so
/// they commit together (spec.md §5).
pub struct MemoryObservationStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryObservationStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows: HashMap::new(),
                last_total: None,
            }),
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
impl ObservationStore for MemoryObservationStore {
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
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.rows.get(&slot_start) {
            return Ok(existing.clone());
        }

        let mut gap = false;
        let (pv_kwh, load_kwh, import_kwh, export_kwh, batt_charge_kwh, batt_discharge_kwh, water_kwh) =
            match inner.last_total {
                None => (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                Some(last) => {
                    let (pv, g1) = field_delta(reading.pv_kwh, last.pv_kwh);
                    let (load, g2) = field_delta(reading.load_kwh, last.load_kwh);
                    let (import, g3) = field_delta(reading.import_kwh, last.import_kwh);
                    let (export, g4) = field_delta(reading.export_kwh, last.export_kwh);
                    let (charge, g5) = field_delta(reading.batt_charge_kwh, last.batt_charge_kwh);
                    let (discharge, g6) =
                        field_delta(reading.batt_discharge_kwh, last.batt_discharge_kwh);
                    let (water, g7) = field_delta(reading.water_kwh, last.water_kwh);
                    gap = g1 || g2 || g3 || g4 || g5 || g6 || g7;
                    (pv, load, import, export, charge, discharge, water)
                }
            };

        inner.last_total = Some(reading);

        let mut observation = Observation {
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
            quality_flags: Vec::new(),
            recorded_at: Utc::now(),
        };
        observation.tag("auto_recorded");
        if gap {
            observation.tag("sensor_reset");
        }

        inner.rows.insert(slot_start, observation.clone());
        Ok(observation)
    }

    async fn get(&self, slot_start: DateTime<Utc>) -> Result<Option<Observation>, PlannerError> {
        Ok(self.inner.lock().rows.get(&slot_start).cloned())
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, PlannerError> {
        let inner = self.inner.lock();
        let mut out: Vec<Observation> = inner
            .rows
            .values()
            .filter(|o| o.slot_start >= from && o.slot_start < to)
            .cloned()
            .collect();
        out.sort_by_key(|o| o.slot_start);
        Ok(out)
    }
}
