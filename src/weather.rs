#![allow(dead_code)]
//! Daily-mean-temperature feed for the dynamic S-index (spec.md §4.5, §6
//! "temperature forecast by day-offset").
//!
//! Grounded on the teacher's `forecast::weather::SmhiClient` (SMHI point
//! forecast endpoint, geo-located query), narrowed from a full
//! `WeatherForecast` (cloud cover, wind, precipitation, humidity -- none of
//! which this crate's risk engine consumes) down to the one signal
//! `RiskEngine` actually needs: mean temperature per day offset.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;

use crate::sensors::TemperatureSource;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SmhiResponse {
    #[serde(rename = "timeSeries")]
    time_series: Vec<SmhiTimeSeriesEntry>,
}

#[derive(Debug, Deserialize)]
struct SmhiTimeSeriesEntry {
    #[serde(rename = "validTime")]
    valid_time: DateTime<Utc>,
    parameters: Vec<SmhiParameter>,
}

#[derive(Debug, Deserialize)]
struct SmhiParameter {
    name: String,
    values: Vec<f64>,
}

/// SMHI point-forecast client narrowed to temperature-by-day-offset
/// (spec.md §4.5). Network failures degrade to "no signal for this
/// offset" rather than aborting the tick -- the risk engine already
/// treats a fully-missing dynamic signal as base-factor-equivalent.
pub struct SmhiTemperatureSource {
    client: Client,
    base_url: String,
    location: GeoLocation,
}

impl SmhiTemperatureSource {
    pub fn new(location: GeoLocation) -> Self {
        Self {
            client: Client::builder()
                .timeout(StdDuration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: "https://opendata-download-metfcst.smhi.se/api".to_string(),
            location,
        }
    }

    fn forecast_url(&self) -> String {
        format!(
            "{}/category/pmp3g/version/2/geotype/point/lon/{:.6}/lat/{:.6}/data.json",
            self.base_url, self.location.longitude, self.location.latitude
        )
    }

    async fn fetch_daily_means(&self) -> anyhow::Result<Vec<(chrono::NaiveDate, f64)>> {
        let resp = self.client.get(self.forecast_url()).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("SMHI API error: HTTP {}", resp.status());
        }
        let parsed: SmhiResponse = resp.json().await?;

        let mut by_day: std::collections::HashMap<chrono::NaiveDate, Vec<f64>> =
            std::collections::HashMap::new();
        for entry in parsed.time_series {
            let Some(temp) = entry
                .parameters
                .iter()
                .find(|p| p.name == "t")
                .and_then(|p| p.values.first())
            else {
                continue;
            };
            by_day
                .entry(entry.valid_time.date_naive())
                .or_default()
                .push(*temp);
        }

        let mut out: Vec<_> = by_day
            .into_iter()
            .map(|(day, temps)| (day, temps.iter().sum::<f64>() / temps.len() as f64))
            .collect();
        out.sort_by_key(|(day, _)| *day);
        Ok(out)
    }
}

#[async_trait]
impl TemperatureSource for SmhiTemperatureSource {
    async fn daily_mean_c(&self, now: DateTime<Utc>, day_offset: u32) -> Option<f64> {
        let target = now.date_naive() + Duration::days(day_offset as i64);
        let means = self.fetch_daily_means().await.ok()?;
        means
            .into_iter()
            .find(|(day, _)| *day == target)
            .map(|(_, mean)| mean)
    }
}
