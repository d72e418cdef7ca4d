use chrono::{Timelike, Utc};

use crate::domain::Observation;

/// Fallback forecaster used by the input assembler (C4) when no stored
/// forecast covers a slot (spec.md §4.4 step 3, §7 `ForecastMissing`):
/// a trailing 7-day average of realized PV/load for the same hour-of-day.
pub struct NaiveForecaster;

impl NaiveForecaster {
    /// Average realized `pv_kwh`/`load_kwh` from `observations` whose
    /// `slot_start` hour matches `hour_of_day` and falls within the last
    /// `lookback_days` days relative to `reference`. Returns `None` when no
    /// matching observation exists.
    pub fn naive_pv_load(
        observations: &[Observation],
        hour_of_day: u32,
        reference: chrono::DateTime<Utc>,
        lookback_days: i64,
    ) -> Option<(f64, f64)> {
        let cutoff = reference - chrono::Duration::days(lookback_days);
        let matching: Vec<&Observation> = observations
            .iter()
            .filter(|o| o.slot_start >= cutoff && o.slot_start < reference)
            .filter(|o| o.slot_start.hour() == hour_of_day)
            .collect();
        if matching.is_empty() {
            return None;
        }
        let n = matching.len() as f64;
        let pv = matching.iter().map(|o| o.pv_kwh).sum::<f64>() / n;
        let load = matching.iter().map(|o| o.load_kwh).sum::<f64>() / n;
        Some((pv, load))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn obs(slot_start: chrono::DateTime<Utc>, pv: f64, load: f64) -> Observation {
        Observation {
            slot_start,
            slot_end: slot_start + Duration::minutes(15),
            pv_kwh: pv,
            load_kwh: load,
            import_kwh: 0.0,
            export_kwh: 0.0,
            batt_charge_kwh: 0.0,
            batt_discharge_kwh: 0.0,
            water_kwh: 0.0,
            soc_start_percent: None,
            soc_end_percent: None,
            import_price: 0.1,
            export_price: 0.05,
            quality_flags: vec![],
            recorded_at: slot_start,
        }
    }

    #[test]
    fn averages_matching_hour_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
        let observations = vec![
            obs(now - Duration::days(1), 1.0, 0.5),
            obs(now - Duration::days(2), 2.0, 0.7),
            obs(now - Duration::days(10), 100.0, 100.0), // outside lookback window
        ];
        let result = NaiveForecaster::naive_pv_load(&observations, 12, now, 7).unwrap();
        assert!((result.0 - 1.5).abs() < 1e-9);
        assert!((result.1 - 0.6).abs() < 1e-9);
    }

    #[test]
    fn returns_none_when_no_match() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
        assert!(NaiveForecaster::naive_pv_load(&[], 12, now, 7).is_none());
    }
}
