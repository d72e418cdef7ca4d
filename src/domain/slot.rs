use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single immutable time interval with a price and a forecast value
/// (spec.md §3 "Slot"). The canonical length is 15 minutes but the model
/// tolerates 30/60-minute and mixed-duration horizons (DST transitions).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub import_price: f64,
    pub export_price: f64,
    pub pv_forecast_kwh: f64,
    pub load_forecast_kwh: f64,
    pub pv_p10_kwh: Option<f64>,
    pub pv_p90_kwh: Option<f64>,
    pub load_p10_kwh: Option<f64>,
    pub load_p90_kwh: Option<f64>,
}

impl Slot {
    /// Duration of this slot in hours. Never zero: construction is rejected
    /// otherwise (see `Horizon::new`).
    pub fn duration_h(&self) -> f64 {
        self.end.signed_duration_since(self.start).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// An ordered, contiguous sequence of slots (spec.md §3 "Horizon").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Horizon {
    slots: Vec<Slot>,
}

#[derive(Debug, Error, PartialEq)]
pub enum HorizonError {
    #[error("horizon has no slots")]
    Empty,
    #[error("slot {index} has end <= start")]
    NonPositiveDuration { index: usize },
    #[error("slot {index} is non-negative-forecast violation (pv or load < 0)")]
    NegativeForecast { index: usize },
    #[error("slot {index} violates p10 <= forecast <= p90")]
    PercentileOutOfOrder { index: usize },
    #[error("slots {prev} and {next} are not contiguous (prev.end != next.start)")]
    NonContiguous { prev: usize, next: usize },
    #[error("horizon spans {hours:.2}h, shorter than the required minimum of {min_hours:.2}h")]
    TooShort { hours: f64, min_hours: f64 },
}

impl Horizon {
    /// Validate and wrap a sequence of slots. Slots must already be sorted
    /// ascending by `start` (per spec.md §4.1, ordering is a tariff-model
    /// responsibility upstream of horizon construction).
    pub fn new(slots: Vec<Slot>, min_hours: f64) -> Result<Self, HorizonError> {
        if slots.is_empty() {
            return Err(HorizonError::Empty);
        }
        for (index, slot) in slots.iter().enumerate() {
            if slot.end <= slot.start {
                return Err(HorizonError::NonPositiveDuration { index });
            }
            if slot.pv_forecast_kwh < 0.0 || slot.load_forecast_kwh < 0.0 {
                return Err(HorizonError::NegativeForecast { index });
            }
            if let (Some(p10), Some(p90)) = (slot.pv_p10_kwh, slot.pv_p90_kwh) {
                if !(p10 <= slot.pv_forecast_kwh && slot.pv_forecast_kwh <= p90) {
                    return Err(HorizonError::PercentileOutOfOrder { index });
                }
            }
            if let (Some(p10), Some(p90)) = (slot.load_p10_kwh, slot.load_p90_kwh) {
                if !(p10 <= slot.load_forecast_kwh && slot.load_forecast_kwh <= p90) {
                    return Err(HorizonError::PercentileOutOfOrder { index });
                }
            }
            if index > 0 && slots[index - 1].end != slot.start {
                return Err(HorizonError::NonContiguous {
                    prev: index - 1,
                    next: index,
                });
            }
        }
        let total_hours = slots.last().unwrap().end.signed_duration_since(slots[0].start)
            .num_milliseconds() as f64
            / 3_600_000.0;
        if total_hours < min_hours {
            return Err(HorizonError::TooShort {
                hours: total_hours,
                min_hours,
            });
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.slots[0].start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.slots[self.slots.len() - 1].end
    }

    /// Average slot duration in hours, used for bucketing daily requirements
    /// (spec.md §4.6 "Units use the average slot duration for kwh_per_slot").
    pub fn avg_duration_h(&self) -> f64 {
        let total: f64 = self.slots.iter().map(Slot::duration_h).sum();
        total / self.slots.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slot(start: DateTime<Utc>, minutes: i64) -> Slot {
        Slot {
            start,
            end: start + Duration::minutes(minutes),
            import_price: 0.1,
            export_price: 0.05,
            pv_forecast_kwh: 0.0,
            load_forecast_kwh: 0.1,
            pv_p10_kwh: None,
            pv_p90_kwh: None,
            load_p10_kwh: None,
            load_p90_kwh: None,
        }
    }

    #[test]
    fn rejects_non_contiguous_slots() {
        let t0 = Utc::now();
        let slots = vec![slot(t0, 15), slot(t0 + Duration::minutes(30), 15)];
        assert_eq!(
            Horizon::new(slots, 0.0),
            Err(HorizonError::NonContiguous { prev: 0, next: 1 })
        );
    }

    #[test]
    fn accepts_mixed_duration_contiguous_slots() {
        let t0 = Utc::now();
        let s0 = slot(t0, 15);
        let s1 = slot(s0.end, 60);
        let horizon = Horizon::new(vec![s0, s1], 0.0).unwrap();
        assert_eq!(horizon.len(), 2);
        assert_eq!(horizon.start(), t0);
    }

    #[test]
    fn rejects_too_short_horizon() {
        let t0 = Utc::now();
        let slots = vec![slot(t0, 15)];
        assert!(matches!(
            Horizon::new(slots, 24.0),
            Err(HorizonError::TooShort { .. })
        ));
    }
}
