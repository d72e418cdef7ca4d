//! HTTP day-ahead price feed (spec.md §6 "Tariff feed").
//!
//! Grounded on the teacher's `forecast::prices::ElprisetJustNuPriceForecaster`
//! (daily JSON endpoint, in-memory TTL cache, `USER_AGENT` header) --
//! retargeted from the teacher's per-area `PricePoint` DTO to
//! `RawPricePoint`, and from "predict next 24h" to "today + tomorrow, with
//! tomorrow tolerated as absent" (spec.md §4.1).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::RawPricePoint;
use crate::tariff::TariffSource;

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(rename = "SEK_per_kWh")]
    sek_per_kwh: f64,
    time_start: DateTime<Utc>,
    time_end: DateTime<Utc>,
}

/// Fetches day-ahead spot prices from elprisetjustnu.se's per-day JSON
/// endpoint (one request for today, one for tomorrow if published). Caches
/// the combined result in memory for `ttl` to avoid hammering the upstream
/// on every orchestrator tick.
#[derive(Clone)]
pub struct DayAheadTariffSource {
    base_url: String,
    area: String,
    client: reqwest::Client,
    cache: Arc<RwLock<Option<(DateTime<Utc>, Vec<RawPricePoint>)>>>,
    ttl: StdDuration,
}

impl DayAheadTariffSource {
    pub fn new(base_url: String, area: String, ttl: StdDuration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("oec-planner/0.3"),
        );
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url,
            area,
            client,
            cache: Arc::new(RwLock::new(None)),
            ttl,
        })
    }

    fn url_for(&self, date: chrono::NaiveDate) -> String {
        format!(
            "{}/api/v1/prices/{:04}/{:02}-{:02}_{}.json",
            self.base_url.trim_end_matches('/'),
            date.year(),
            date.month(),
            date.day(),
            self.area
        )
    }

    async fn fetch_day(&self, date: chrono::NaiveDate) -> Result<Vec<RawPricePoint>> {
        let url = self.url_for(date);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("day-ahead price GET failed")?;
        let status = resp.status();
        let body = resp.text().await.context("day-ahead price body read failed")?;
        if !status.is_success() {
            anyhow::bail!("day-ahead price API error: HTTP {status}: {body}");
        }
        let raw: Vec<RawPrice> =
            serde_json::from_str(&body).context("day-ahead price JSON parse failed")?;
        Ok(raw
            .into_iter()
            .map(|r| RawPricePoint {
                start: r.time_start,
                end: r.time_end,
                spot_price_per_kwh: r.sek_per_kwh,
            })
            .collect())
    }
}

#[async_trait]
impl TariffSource for DayAheadTariffSource {
    async fn today_and_tomorrow(&self, now: DateTime<Utc>) -> Result<Vec<RawPricePoint>> {
        {
            let cache = self.cache.read().await;
            if let Some((fetched_at, points)) = &*cache {
                if (now - *fetched_at).num_seconds() < self.ttl.as_secs() as i64 {
                    return Ok(points.clone());
                }
            }
        }

        let today = now.date_naive();
        let mut points = self
            .fetch_day(today)
            .await
            .context("today's day-ahead prices unavailable")?;

        // spec.md §4.1: tomorrow's prices may not be published yet; absence
        // is tolerated, not an error.
        if let Ok(mut tomorrow) = self.fetch_day(today.succ_opt().unwrap_or(today)).await {
            points.append(&mut tomorrow);
        }
        points.sort_by_key(|p| p.start);

        let mut cache = self.cache.write().await;
        *cache = Some((now, points.clone()));
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_formats_date_and_area() {
        let source = DayAheadTariffSource::new(
            "https://example.invalid".to_string(),
            "SE3".to_string(),
            StdDuration::from_secs(3600),
        )
        .unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            source.url_for(date),
            "https://example.invalid/api/v1/prices/2024/03-05_SE3.json"
        );
    }
}
