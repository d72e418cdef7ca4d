mod config;
mod domain;
mod error;
mod forecast;
mod observation;
mod orchestrator;
mod planning;
mod risk;
mod schedule_store;
mod sensors;
mod solver;
mod tariff;
mod telemetry;
mod weather;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use config::AppConfig;
use forecast::{ForecastStore, MemoryForecastStore};
use observation::{MemoryObservationStore, ObservationStore};
use orchestrator::Orchestrator;
use schedule_store::{MemorySchedulestore, ScheduleStore};
use sensors::{LiveSensors, NoTemperatureData, StaticLiveSensors, TemperatureSource};
use tariff::{DayAheadTariffSource, TariffSource};
use weather::{GeoLocation, SmhiTemperatureSource};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = AppConfig::load()?;
    info!(timezone = %cfg.timezone, "configuration loaded");

    let tariff: Arc<dyn TariffSource> = Arc::new(DayAheadTariffSource::new(
        cfg.tariff_feed.base_url.clone(),
        cfg.tariff_feed.area.clone(),
        StdDuration::from_secs(cfg.tariff_feed.cache_ttl_s),
    )?);

    let temperature: Arc<dyn TemperatureSource> =
        if cfg.location.latitude == 0.0 && cfg.location.longitude == 0.0 {
            warn!("no site location configured, dynamic S-index temperature signal disabled");
            Arc::new(NoTemperatureData)
        } else {
            Arc::new(SmhiTemperatureSource::new(GeoLocation {
                latitude: cfg.location.latitude,
                longitude: cfg.location.longitude,
            }))
        };

    let sensors: Arc<dyn LiveSensors> = Arc::new(StaticLiveSensors::new(
        cfg.battery.capacity_kwh * cfg.battery.min_soc_percent / 100.0,
    ));

    let (forecast, observation, schedule): (
        Arc<dyn ForecastStore>,
        Arc<dyn ObservationStore>,
        Arc<dyn ScheduleStore>,
    ) = build_stores(&cfg).await?;

    let orchestrator = Orchestrator::new(
        cfg,
        tariff,
        forecast,
        observation,
        schedule,
        sensors,
        temperature,
    );

    let (plan_handle, obs_handle) = orchestrator.spawn();
    info!("orchestrator started");

    telemetry::shutdown_signal().await;
    orchestrator.request_shutdown();

    if let Err(e) = plan_handle.await {
        error!(error = %e, "plan timer task panicked");
    }
    if let Err(e) = obs_handle.await {
        error!(error = %e, "observation timer task panicked");
    }

    info!("shutdown complete");
    Ok(())
}

/// Bounded exponential-backoff retry around the initial pool connection,
/// mirroring the teacher's `Database::connect_with_retry`.
#[cfg(feature = "db")]
async fn connect_with_retry(
    options: &sqlx::postgres::PgPoolOptions,
    url: &str,
    max_attempts: u32,
) -> Result<sqlx::PgPool> {
    let mut attempt = 0u32;
    let mut delay = std::time::Duration::from_secs(1);
    loop {
        attempt += 1;
        match options.clone().connect(url).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt >= max_attempts => {
                return Err(e).context(format!(
                    "failed to connect to database after {} attempts",
                    max_attempts
                ));
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    ?delay,
                    "database connection attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

#[cfg(feature = "db")]
async fn build_stores(
    cfg: &AppConfig,
) -> Result<(
    Arc<dyn ForecastStore>,
    Arc<dyn ObservationStore>,
    Arc<dyn ScheduleStore>,
)> {
    use forecast::PgForecastStore;
    use observation::PgObservationStore;
    use schedule_store::PgScheduleStore;
    use sqlx::postgres::PgPoolOptions;

    let Some(url) = cfg.database.url.as_ref() else {
        info!("no database.url configured, using in-memory stores");
        return Ok((
            Arc::new(MemoryForecastStore::default()),
            Arc::new(MemoryObservationStore::default()),
            Arc::new(MemorySchedulestore::default()),
        ));
    };

    info!("connecting to Postgres");
    let pool = connect_with_retry(&PgPoolOptions::new().max_connections(cfg.database.max_connections), url, 5).await?;

    Ok((
        Arc::new(PgForecastStore::new(pool.clone())),
        Arc::new(PgObservationStore::new(pool.clone())),
        Arc::new(PgScheduleStore::new(pool)),
    ))
}

#[cfg(not(feature = "db"))]
async fn build_stores(
    _cfg: &AppConfig,
) -> Result<(
    Arc<dyn ForecastStore>,
    Arc<dyn ObservationStore>,
    Arc<dyn ScheduleStore>,
)> {
    Ok((
        Arc::new(MemoryForecastStore::default()),
        Arc::new(MemoryObservationStore::default()),
        Arc::new(MemorySchedulestore::default()),
    ))
}
