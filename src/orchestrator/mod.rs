#![allow(dead_code)]
//! Orchestrator (C9): the long-lived process-wide task that runs the
//! recurring planning tick (C4->C6->C7->C8), records observations, and
//! triggers forecast calibration (spec.md §4.9).
//!
//! Grounded on the teacher's `controller::mod::spawn_controller_tasks` +
//! `controller::scheduler::TaskScheduler` (interval timers, per-task status
//! bookkeeping, `tokio::spawn` fan-out), generalized into the explicit
//! `idle/ticking/paused/failed` state machine of spec.md §4.9 in place of
//! the teacher's ad-hoc booleans, and wired through the capability traits
//! (`tariff`, `forecast`, `observation`, `schedule_store`, `sensors`)
//! instead of one shared `AppState`.

mod status;

pub use status::{OrchestratorState, SchedulerStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::domain::{ForecastVersion, SolverStatus};
use crate::error::PlannerError;
use crate::forecast::ForecastStore;
use crate::observation::ObservationStore;
use crate::planning::{assemble, project, LiveState};
use crate::risk::{DailySignals, RiskEngine};
use crate::schedule_store::ScheduleStore;
use crate::sensors::{LiveSensors, TemperatureSource};
use crate::tariff::TariffSource;

/// Everything the orchestrator needs injected at startup (DESIGN NOTE
/// "cyclic singleton access to stores" -> explicit dependencies instead of
/// module-level singletons).
pub struct Orchestrator {
    config: AppConfig,
    tariff: Arc<dyn TariffSource>,
    forecast: Arc<dyn ForecastStore>,
    observation: Arc<dyn ObservationStore>,
    schedule: Arc<dyn ScheduleStore>,
    sensors: Arc<dyn LiveSensors>,
    temperature: Arc<dyn TemperatureSource>,
    status: RwLock<SchedulerStatus>,
    notify_tx: watch::Sender<u64>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        tariff: Arc<dyn TariffSource>,
        forecast: Arc<dyn ForecastStore>,
        observation: Arc<dyn ObservationStore>,
        schedule: Arc<dyn ScheduleStore>,
        sensors: Arc<dyn LiveSensors>,
        temperature: Arc<dyn TemperatureSource>,
    ) -> Arc<Self> {
        let (notify_tx, _) = watch::channel(0u64);
        Arc::new(Self {
            config,
            tariff,
            forecast,
            observation,
            schedule,
            sensors,
            temperature,
            status: RwLock::new(SchedulerStatus::default()),
            notify_tx,
            shutdown: CancellationToken::new(),
        })
    }

    /// Subscribe to schedule-change notifications (spec.md §4.9
    /// "schedule-change notification", §6 "opaque signal, no payload").
    /// The `u64` tick counter is incidental plumbing for `watch`; callers
    /// should treat any change as the signal, not the value itself.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify_tx.subscribe()
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Operator-forced pause: the plan timer stops firing ticks, but the
    /// observation timer keeps running (spec.md §4.9 state machine).
    pub async fn pause(&self) {
        let mut status = self.status.write().await;
        if status.state != OrchestratorState::Ticking {
            status.state = OrchestratorState::Paused;
        }
    }

    pub async fn resume(&self) {
        let mut status = self.status.write().await;
        if status.state == OrchestratorState::Paused {
            status.state = OrchestratorState::Idle;
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Spawn the plan timer and observation timer as independent cooperative
    /// tasks (spec.md §5: "an independent cooperative task for the
    /// observation timer"). Returns both join handles so the caller can
    /// await clean shutdown.
    pub fn spawn(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let plan = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_plan_timer().await })
        };
        let obs = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_observation_timer().await })
        };
        (plan, obs)
    }

    async fn run_plan_timer(self: Arc<Self>) {
        let interval = self.config.planner.interval_minutes.max(1);
        let jitter = self.config.planner.jitter_minutes;
        loop {
            let jitter_secs = if jitter > 0 {
                rand::thread_rng().gen_range(0..=jitter * 60)
            } else {
                0
            };
            let sleep = StdDuration::from_secs(interval * 60 + jitter_secs);
            {
                let next_run = Utc::now() + Duration::seconds(sleep.as_secs() as i64);
                self.status.write().await.next_run = Some(next_run);
            }
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = self.shutdown.cancelled() => {
                    info!("plan timer shutting down");
                    return;
                }
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "planning tick failed");
            }
        }
    }

    async fn run_observation_timer(self: Arc<Self>) {
        let resolution = self.config.resolution_minutes();
        loop {
            let now = Utc::now();
            let next_boundary = crate::tariff::round_up_to_slot_boundary(now, resolution);
            let wait = (next_boundary - now).to_std().unwrap_or(StdDuration::from_secs(1));
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.cancelled() => {
                    info!("observation timer shutting down");
                    return;
                }
            }
            if let Err(e) = self.observation_tick(resolution).await {
                warn!(error = %e, "observation recording failed");
            }
        }
    }

    /// Run one planning tick: C4 (assemble) -> C6 (solve) -> C7 (project) ->
    /// C8 (merge + persist). Overlapping ticks are forbidden (spec.md §4.9):
    /// if the state is already `Ticking`, this fire is skipped and logged.
    pub async fn tick(self: &Arc<Self>) -> Result<(), PlannerError> {
        {
            let mut status = self.status.write().await;
            match status.state {
                OrchestratorState::Ticking => {
                    warn!("previous tick still running, skipping this fire");
                    return Ok(());
                }
                OrchestratorState::Paused => {
                    return Ok(());
                }
                _ => status.state = OrchestratorState::Ticking,
            }
        }

        let now = Utc::now();
        let result = self.run_tick(now).await;

        let mut status = self.status.write().await;
        status.last_run = Some(now);
        match &result {
            Ok(()) => {
                status.state = OrchestratorState::Idle;
                status.last_error = None;
            }
            Err(e) => {
                status.state = OrchestratorState::Failed;
                status.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn run_tick(&self, now: DateTime<Utc>) -> Result<(), PlannerError> {
        let terminal_value_per_kwh = self.compute_terminal_value(now).await;

        let live = LiveState {
            live_soc_kwh: self.sensors.battery_soc_kwh().await?,
            heated_today_kwh: self.sensors.water_heated_today_kwh().await,
            locked_on_slots: self.sensors.water_locked_on_slots().await,
            target_soc_kwh: self.sensors.target_soc_kwh().await,
            terminal_value_per_kwh,
            grid_import_limit_kw: self.sensors.grid_import_limit_kw().await,
            max_export_kw: self.sensors.max_export_kw().await,
        };

        let input = assemble(
            now,
            &self.config,
            self.tariff.as_ref(),
            self.forecast.as_ref(),
            self.observation.as_ref(),
            live,
        )
        .await?;

        let tz = self
            .config
            .tz()
            .map_err(|e| PlannerError::ConfigInvalid(e.to_string()))?;
        let timeout_s = self.config.planner.solve_timeout_s;
        let input_for_solve = input.clone();

        // Offload the CPU-bound MILP solve so the orchestrator's own task
        // stays responsive (spec.md §5); bound by a wall-clock deadline.
        let solve_fut = tokio::task::spawn_blocking(move || crate::solver::solve(&input_for_solve, tz));
        let result = match tokio::time::timeout(StdDuration::from_secs(timeout_s), solve_fut).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => return Err(PlannerError::SolverError(join_err.to_string())),
            Err(_) => return Err(PlannerError::SolverTimeout(timeout_s * 1000)),
        };

        match result.status {
            SolverStatus::Optimal => {}
            SolverStatus::Infeasible => return Err(PlannerError::SolverInfeasible),
            SolverStatus::Timeout => return Err(PlannerError::SolverTimeout(result.solve_time_ms)),
            SolverStatus::Error => {
                return Err(PlannerError::SolverError(
                    "solver backend reported an error status".to_string(),
                ))
            }
        }

        let projection = project(&input, &result, None)
            .ok_or_else(|| PlannerError::SolverError("projection produced no schedule".to_string()))?;

        let merged = self.schedule.merge_and_swap(projection, now).await?;
        self.notify_tx.send_modify(|tick| *tick = tick.wrapping_add(1));
        info!(schedule_id = %merged.id, entries = merged.entries.len(), "published new schedule");
        Ok(())
    }

    /// Dynamic S-index (spec.md §4.5): pull day-offset PV/load forecast
    /// sums and temperature signals, run the risk engine, and turn the
    /// resulting factor into a terminal value per kWh using the average
    /// import price across the available tariff window. Static mode and a
    /// fully-missing dynamic signal set both degrade to `base_factor`.
    async fn compute_terminal_value(&self, now: DateTime<Utc>) -> f64 {
        let risk_profile = self.config.risk_profile();
        let version = ForecastVersion(self.config.forecast.active_version.clone());
        let tz = self.config.tz().unwrap_or(chrono_tz::UTC);
        let today = now.with_timezone(&tz).date_naive();

        let mut pv_kwh = HashMap::new();
        let mut load_kwh = HashMap::new();
        let mut temp_c = HashMap::new();

        for &offset in &risk_profile.days_ahead_for_sindex {
            let Some(day) = today.checked_add_signed(Duration::days(offset as i64)) else {
                continue;
            };
            let Some(local_midnight) = day.and_hms_opt(0, 0, 0) else {
                continue;
            };
            let Some(day_start) = tz
                .from_local_datetime(&local_midnight)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
            else {
                continue;
            };
            let day_end = day_start + Duration::days(1);

            if let Ok(rows) = self.forecast.range(day_start, day_end, &version).await {
                if !rows.is_empty() {
                    pv_kwh.insert(offset, rows.iter().map(|r| r.effective_pv_kwh()).sum());
                    load_kwh.insert(offset, rows.iter().map(|r| r.effective_load_kwh()).sum());
                }
            }
            if let Some(mean_temp) = self.temperature.daily_mean_c(now, offset).await {
                temp_c.insert(offset, mean_temp);
            }
        }

        let signals = DailySignals {
            pv_kwh: &pv_kwh,
            load_kwh: &load_kwh,
            temp_c: &temp_c,
        };
        let (factor, _debug) = RiskEngine::factor(&risk_profile, &signals);
        let avg_future_price = self.average_import_price(now).await;
        RiskEngine::terminal_value_per_kwh(factor, avg_future_price)
    }

    async fn average_import_price(&self, now: DateTime<Utc>) -> f64 {
        let pricing: crate::tariff::PricingConfig = (&self.config.pricing).into();
        match self.tariff.today_and_tomorrow(now).await {
            Ok(points) if !points.is_empty() => {
                let sum: f64 = points
                    .iter()
                    .map(|p| pricing.import_price(p.spot_price_per_kwh))
                    .sum();
                sum / points.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Observation timer body (spec.md §4.9): read the cumulative sensors
    /// once for the slot that just elapsed, compute deltas via the store
    /// (idempotent per `slot_start`), and record.
    async fn observation_tick(&self, resolution_minutes: i64) -> Result<(), PlannerError> {
        let now = Utc::now();
        let slot_end = floor_to_slot_boundary(now, resolution_minutes);
        let slot_start = slot_end - Duration::minutes(resolution_minutes);

        let reading = self
            .sensors
            .cumulative_reading()
            .await
            .map_err(|e| PlannerError::ObservationGap {
                slot_start,
                reason: e.to_string(),
            })?;

        let soc_end_percent = self.sensors.battery_soc_kwh().await.ok();
        let schedule = self.schedule.current().await;
        let import_price = schedule
            .as_ref()
            .and_then(|s| s.slot_at(slot_start))
            .map(|e| e.import_price)
            .unwrap_or(0.0);
        let export_price = schedule
            .as_ref()
            .and_then(|s| s.slot_at(slot_start))
            .map(|e| e.export_price)
            .unwrap_or(0.0);

        self.observation
            .record(
                slot_start,
                slot_end,
                reading,
                None,
                soc_end_percent,
                import_price,
                export_price,
            )
            .await?;
        Ok(())
    }
}

/// The boundary at or before `now` -- the start of the slot currently in
/// progress, i.e. the end of the slot that just elapsed. Complements
/// `tariff::round_up_to_slot_boundary`.
fn floor_to_slot_boundary(now: DateTime<Utc>, resolution_minutes: i64) -> DateTime<Utc> {
    let step_secs = resolution_minutes * 60;
    let epoch_secs = now.timestamp();
    let remainder = epoch_secs.rem_euclid(step_secs);
    now - Duration::seconds(remainder) - Duration::nanoseconds(now.timestamp_subsec_nanos() as i64)
}
