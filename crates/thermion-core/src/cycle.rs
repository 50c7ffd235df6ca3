// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of ThermION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Orchestration shell around the pure engine.
//!
//! One [`ControlLoop`] owns the mutable state (history, thermal model,
//! calibration RNG) behind a single async mutex, so decision and calibration
//! cycles never interleave. A per-kind single-flight flag rejects re-entrant
//! triggers of the same kind.

use crate::calibration::{CalibrationOutcome, CalibrationService};
use crate::comfort::ComfortProfile;
use crate::error::{CycleError, CycleKind, CycleResult};
use crate::history::DecisionHistory;
use crate::pricing::{compute_statistics, current_price_point, normalize_series};
use crate::savings::SavingsSummary;
use crate::strategy::{CycleInput, LoadInput, OptimizationEngine};
use crate::traits::{DeviceGateway, HistoryStore, PriceDataSource, WeatherDataSource};
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thermion_types::{
    ComfortProfileConfig, HistoricalEntry, LoadConstraints, LoadId, OptimizationDecision,
    PriceForecast, ThermalModel, WeatherQuery, WeatherSnapshot,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Per-load engine settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSettings {
    pub constraints: LoadConstraints,
    pub apply_weather: bool,
}

impl LoadSettings {
    pub fn zone(constraints: LoadConstraints) -> Self {
        Self {
            constraints,
            apply_weather: true,
        }
    }

    pub fn tank(constraints: LoadConstraints) -> Self {
        Self {
            constraints,
            apply_weather: false,
        }
    }
}

/// Static configuration consumed by the control loop
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub zone1: LoadSettings,
    pub zone2: Option<LoadSettings>,
    pub tank: Option<LoadSettings>,
    pub comfort: ComfortProfileConfig,

    /// Configured K, used when no calibration was persisted
    pub thermal_k: f32,

    /// Local clock for comfort windows and daily projections
    pub timezone: Tz,

    /// Compute and record decisions without commanding devices
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zone1: LoadSettings::zone(LoadConstraints::zone_default()),
            zone2: None,
            tank: None,
            comfort: ComfortProfileConfig::default(),
            thermal_k: ThermalModel::DEFAULT_K,
            timezone: chrono_tz::UTC,
            dry_run: true,
        }
    }
}

impl EngineConfig {
    /// Configured loads in evaluation order
    pub fn loads(&self) -> Vec<(LoadId, LoadSettings)> {
        let mut loads = vec![(LoadId::Zone1, self.zone1)];
        if let Some(zone2) = self.zone2 {
            loads.push((LoadId::Zone2, zone2));
        }
        if let Some(tank) = self.tank {
            loads.push((LoadId::Tank, tank));
        }
        loads
    }
}

/// External collaborators used by each cycle
#[derive(Clone)]
pub struct DataSources {
    pub prices: Arc<dyn PriceDataSource>,
    pub weather: Option<Arc<dyn WeatherDataSource>>,
    pub devices: Arc<dyn DeviceGateway>,
    pub store: Arc<dyn HistoryStore>,
}

impl std::fmt::Debug for DataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSources")
            .field("prices", &self.prices.name())
            .field("weather", &self.weather.as_ref().map(|w| w.name()))
            .field("devices", &self.devices.name())
            .finish_non_exhaustive()
    }
}

/// Summary of one completed decision cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub decisions: Vec<OptimizationDecision>,
    pub savings: SavingsSummary,
    pub comfort_factor: f32,
    pub forecast: PriceForecast,
    pub current_price: Option<f32>,
    pub weather: Option<WeatherSnapshot>,
    pub dry_run: bool,
    pub history_len: usize,
}

#[derive(Debug)]
struct ControlState {
    history: DecisionHistory,
    thermal: ThermalModel,
    calibration: CalibrationService,
}

/// Clears its flag on drop so a failed cycle never blocks the next one
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, kind: CycleKind) -> CycleResult<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(CycleError::AlreadyRunning { kind });
        }
        Ok(Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Explicit context object driving hourly decisions and weekly calibration
#[derive(Debug)]
pub struct ControlLoop {
    config: EngineConfig,
    sources: DataSources,
    engine: OptimizationEngine,
    comfort: ComfortProfile,
    state: Mutex<ControlState>,
    decision_running: AtomicBool,
    calibration_running: AtomicBool,
}

impl ControlLoop {
    pub fn new(
        config: EngineConfig,
        sources: DataSources,
        thermal: ThermalModel,
        history: Vec<HistoricalEntry>,
    ) -> Self {
        let comfort = ComfortProfile::new(config.comfort.clone());
        Self {
            config,
            sources,
            engine: OptimizationEngine::with_default_strategies(),
            comfort,
            state: Mutex::new(ControlState {
                history: DecisionHistory::from_entries(history),
                thermal,
                calibration: CalibrationService::new(),
            }),
            decision_running: AtomicBool::new(false),
            calibration_running: AtomicBool::new(false),
        }
    }

    /// Build from persisted state: stored history plus the latest calibrated K
    /// (falling back to the configured K)
    pub async fn restore(config: EngineConfig, sources: DataSources) -> Result<Self> {
        let history = sources.store.load().await?;
        let thermal = match sources.store.latest_calibration().await? {
            Some(latest) => {
                info!(
                    "📈 Restored calibrated K={:.3} from {}",
                    latest.new_k, latest.timestamp
                );
                let mut model = ThermalModel::default();
                model.set_k(latest.new_k, latest.timestamp);
                model
            }
            None => {
                info!("📈 No calibration on record, using configured K={:.3}", config.thermal_k);
                ThermalModel::new(config.thermal_k)
            }
        };
        info!("📚 Restored {} history entries", history.len());
        Ok(Self::new(config, sources, thermal, history))
    }

    /// Replace the calibration service (e.g. with a seeded one)
    #[must_use]
    pub fn with_calibration_service(self, calibration: CalibrationService) -> Self {
        let mut state = self.state.into_inner();
        state.calibration = calibration;
        Self {
            state: Mutex::new(state),
            ..self
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn thermal_model(&self) -> ThermalModel {
        self.state.lock().await.thermal
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    pub async fn history_snapshot(&self) -> Vec<HistoricalEntry> {
        self.state.lock().await.history.to_vec()
    }

    /// Run one decision cycle. Fails closed on missing price or device data.
    pub async fn run_decision_cycle(&self, now: DateTime<Utc>) -> CycleResult<CycleReport> {
        let _guard = FlightGuard::acquire(&self.decision_running, CycleKind::Decision)?;
        let mut state = self.state.lock().await;

        info!("🔄 [CYCLE] Decision cycle at {}", now);

        let prices = self.sources.prices.read_prices().await.map_err(|e| {
            error!("❌ [CYCLE] Price fetch failed, skipping this hour: {e:#}");
            CycleError::PriceUnavailable {
                source_name: self.sources.prices.name().to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        if prices.is_empty() {
            warn!("⚠️ [CYCLE] Price source returned no data, using neutral price");
        }

        let stats = compute_statistics(&prices);
        let series = normalize_series(&prices);
        let current_price = current_price_point(&series, now).map_or(0.0, |p| p.price);

        let mut inputs = Vec::new();
        for (load, settings) in self.config.loads() {
            let load_state = self.sources.devices.read_state(load).await.map_err(|e| {
                error!("❌ [CYCLE] Failed to read {load}, skipping this hour: {e:#}");
                CycleError::DeviceRead {
                    load: load.to_string(),
                    source_name: self.sources.devices.name().to_string(),
                    reason: format!("{e:#}"),
                }
            })?;
            debug!(
                "  {}: current {:.1}°C, target {:.1}°C",
                load.display_name(),
                load_state.current_temp,
                load_state.current_target
            );
            inputs.push(LoadInput {
                load,
                constraints: settings.constraints,
                state: load_state,
                weather: None,
                apply_weather: settings.apply_weather,
            });
        }

        if let Some(weather) = &self.sources.weather {
            for input in inputs.iter_mut().filter(|i| i.apply_weather) {
                let query = WeatherQuery {
                    current_temp: input.state.current_temp,
                    target_temp: input.state.current_target,
                    current_price,
                    avg_price: stats.avg,
                    now,
                };
                match weather.adjustment(&query).await {
                    Ok(adjustment) => {
                        debug!(
                            "  {} weather bias {:+.1}°C ({})",
                            input.load, adjustment.adjustment_degrees, adjustment.reason
                        );
                        input.weather = Some(adjustment);
                    }
                    Err(e) => warn!(
                        "⚠️ [CYCLE] Weather unavailable from {} for {}, skipping bias: {e:#}",
                        weather.name(),
                        input.load
                    ),
                }
            }
        }

        let outcome = self.engine.run_cycle(&CycleInput {
            now,
            timezone: self.config.timezone,
            prices: &prices,
            comfort: &self.comfort,
            thermal: &state.thermal,
            history: &state.history,
            loads: &inputs,
        });

        let mut decisions = outcome.decisions;
        for decision in &mut decisions {
            if self.config.dry_run {
                decision.applied = false;
                decision.reason.push_str(" (dry run)");
                info!(
                    "🧪 [DRY RUN] {} {:.1}°C -> {:.1}°C: {}",
                    decision.load, decision.from_temp, decision.to_temp, decision.reason
                );
                continue;
            }

            if !decision.is_change() {
                debug!("  {} unchanged at {:.1}°C", decision.load, decision.to_temp);
                continue;
            }

            match self
                .sources
                .devices
                .write_target(decision.load, decision.to_temp)
                .await
            {
                Ok(()) => info!(
                    "✅ {} {:.1}°C -> {:.1}°C: {}",
                    decision.load, decision.from_temp, decision.to_temp, decision.reason
                ),
                Err(e) => {
                    decision.applied = false;
                    error!(
                        "❌ Failed to apply {:.1}°C to {}: {e:#}",
                        decision.to_temp, decision.load
                    );
                }
            }
        }

        let weather = inputs.iter().find_map(|input| {
            input.weather.as_ref().and_then(|w| {
                w.outdoor_temp.map(|outdoor_temp| WeatherSnapshot {
                    outdoor_temp,
                    adjustment_degrees: w.adjustment_degrees,
                    reason: w.reason.clone(),
                })
            })
        });
        let indoor_temp = inputs.first().map_or(0.0, |i| i.state.current_temp);

        state.history.push(HistoricalEntry {
            timestamp: now,
            decisions: decisions.clone(),
            price_now: outcome.current_price.unwrap_or(0.0),
            indoor_temp,
            outdoor_temp: weather.as_ref().map(|w| w.outdoor_temp),
            savings: outcome.savings.hourly_savings,
            comfort: outcome.savings.comfort_impact,
            weather: weather.clone(),
        });

        if let Err(e) = self.sources.store.save(&state.history.to_vec()).await {
            warn!("⚠️ Failed to persist history: {e:#}");
        }

        info!(
            "💰 [CYCLE] Savings {:.4}/h, projected {:.3}/day, comfort {:+.2}, factor {:.2}",
            outcome.savings.hourly_savings,
            outcome.savings.projected_daily,
            outcome.savings.comfort_impact,
            outcome.comfort_factor
        );
        debug!("  Forecast: {}", outcome.forecast.recommendation);

        Ok(CycleReport {
            timestamp: now,
            decisions,
            savings: outcome.savings,
            comfort_factor: outcome.comfort_factor,
            forecast: outcome.forecast,
            current_price: outcome.current_price,
            weather,
            dry_run: self.config.dry_run,
            history_len: state.history.len(),
        })
    }

    /// Re-estimate K from history and persist the result
    pub async fn run_calibration_cycle(
        &self,
        now: DateTime<Utc>,
    ) -> CycleResult<CalibrationOutcome> {
        let _guard = FlightGuard::acquire(&self.calibration_running, CycleKind::Calibration)?;
        let mut state = self.state.lock().await;
        let ControlState {
            history,
            thermal,
            calibration,
        } = &mut *state;

        info!("🎯 [CALIBRATION] Running with {} history entries", history.len());
        let outcome = calibration.run_calibration(history, thermal, now);

        match &outcome {
            CalibrationOutcome::InsufficientHistory { entries, required } => {
                info!(
                    "⏳ [CALIBRATION] Skipped: {} of {} required entries, K stays {:.3}",
                    entries,
                    required,
                    thermal.k()
                );
            }
            CalibrationOutcome::Calibrated(result)
            | CalibrationOutcome::InsufficientSignal(result) => {
                info!("✅ [CALIBRATION] {}", result.analysis);
                if let Err(e) = self.sources.store.record_calibration(result).await {
                    warn!("⚠️ Failed to persist calibration result: {e:#}");
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _guard = FlightGuard::acquire(&flag, CycleKind::Decision).unwrap();
            assert!(matches!(
                FlightGuard::acquire(&flag, CycleKind::Decision),
                Err(CycleError::AlreadyRunning {
                    kind: CycleKind::Decision
                })
            ));
        }
        assert!(FlightGuard::acquire(&flag, CycleKind::Decision).is_ok());
    }

    #[test]
    fn test_engine_config_load_order() {
        let config = EngineConfig {
            tank: Some(LoadSettings::tank(LoadConstraints::tank_default())),
            zone2: Some(LoadSettings::zone(LoadConstraints::zone_default())),
            ..Default::default()
        };
        let loads: Vec<LoadId> = config.loads().into_iter().map(|(id, _)| id).collect();
        assert_eq!(loads, vec![LoadId::Zone1, LoadId::Zone2, LoadId::Tank]);
        assert!(!config.loads()[2].1.apply_weather);
    }
}
