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

use super::{
    FinalTarget, LoadStrategy, SetpointContext, TankTierStrategy, ZoneComfortStrategy,
    finalize_target,
};
use crate::comfort::{ComfortBand, ComfortProfile, local_hour};
use crate::history::DecisionHistory;
use crate::pricing::PriceAnalysis;
use crate::savings::SavingsSummary;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thermion_types::{
    LoadConstraints, LoadId, LoadState, OptimizationDecision, PriceForecast, PricePattern,
    PricePoint, PriceSeriesStats, ThermalModel, WeatherAdjustment,
};

/// Per-load inputs for one cycle
#[derive(Debug, Clone)]
pub struct LoadInput {
    pub load: LoadId,
    pub constraints: LoadConstraints,
    pub state: LoadState,

    /// Weather bias for this load, if one was fetched
    pub weather: Option<WeatherAdjustment>,

    /// Whether the weather bias is added for this load
    pub apply_weather: bool,
}

/// Everything the engine reads during one decision cycle
#[derive(Debug, Clone)]
pub struct CycleInput<'a> {
    pub now: DateTime<Utc>,
    pub timezone: Tz,
    pub prices: &'a [PricePoint],
    pub comfort: &'a ComfortProfile,
    pub thermal: &'a ThermalModel,
    pub history: &'a DecisionHistory,
    pub loads: &'a [LoadInput],
}

/// Result of one decision cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// One decision per configured load, in input order
    pub decisions: Vec<OptimizationDecision>,
    pub savings: SavingsSummary,
    pub comfort_factor: f32,
    pub forecast: PriceForecast,
    pub stats: PriceSeriesStats,
    pub pattern: PricePattern,
    /// Price in effect, `None` in degraded mode
    pub current_price: Option<f32>,
}

/// Greedy single-step setpoint optimizer. Performs no I/O.
pub struct OptimizationEngine {
    zone_strategy: Arc<dyn LoadStrategy>,
    tank_strategy: Arc<dyn LoadStrategy>,
}

impl std::fmt::Debug for OptimizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationEngine")
            .field("zone_strategy", &self.zone_strategy.name())
            .field("tank_strategy", &self.tank_strategy.name())
            .finish()
    }
}

impl Default for OptimizationEngine {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

impl OptimizationEngine {
    pub fn new(zone_strategy: Arc<dyn LoadStrategy>, tank_strategy: Arc<dyn LoadStrategy>) -> Self {
        Self {
            zone_strategy,
            tank_strategy,
        }
    }

    pub fn with_default_strategies() -> Self {
        Self::new(
            Arc::new(ZoneComfortStrategy::new()),
            Arc::new(TankTierStrategy::new()),
        )
    }

    /// Strategy responsible for a load (both zones share one)
    pub fn strategy_for(&self, load: LoadId) -> &Arc<dyn LoadStrategy> {
        if load.is_zone() {
            &self.zone_strategy
        } else {
            &self.tank_strategy
        }
    }

    /// Decide the next setpoint for a single load
    pub fn decide(&self, context: &SetpointContext<'_>) -> OptimizationDecision {
        let previous = context.previous_target;
        let strategy = self.strategy_for(context.load);

        let evaluation = strategy.evaluate(context);
        let FinalTarget {
            target,
            clamped,
            step_limited,
        } = finalize_target(evaluation.target, context.constraints, previous);

        let mut reasons = evaluation.reasons;
        if clamped {
            reasons.push(format!(
                "clamped to [{:.1}, {:.1}]°C",
                context.constraints.min, context.constraints.max
            ));
        }
        if step_limited {
            reasons.push(format!("limited to ±{:.1}°C step", context.constraints.step));
        }

        OptimizationDecision::new(
            context.load,
            previous,
            target,
            format!("{}: {}", evaluation.strategy_name, reasons.join("; ")),
            context.now,
        )
    }

    /// Run one decision cycle across every load
    pub fn run_cycle(&self, input: &CycleInput<'_>) -> CycleOutcome {
        let analysis = PriceAnalysis::analyze(input.prices, input.now);
        let hour = local_hour(input.now, input.timezone);
        let comfort_factor = input.comfort.comfort_factor(hour);

        let decisions: Vec<OptimizationDecision> = input
            .loads
            .iter()
            .map(|load| {
                let band = if load.load.is_zone() {
                    input.comfort.adjusted_band(&load.constraints, comfort_factor)
                } else {
                    ComfortBand {
                        min: load.constraints.min,
                        max: load.constraints.max,
                    }
                };
                let weather_delta = if load.apply_weather {
                    load.weather.as_ref().map(|w| w.adjustment_degrees)
                } else {
                    None
                };

                let context = SetpointContext {
                    load: load.load,
                    constraints: &load.constraints,
                    band,
                    previous_target: load.state.current_target,
                    analysis: &analysis,
                    thermal: input.thermal,
                    comfort: input.comfort,
                    now: input.now,
                    local_hour: hour,
                    weather_delta,
                };
                self.decide(&context)
            })
            .collect();

        let savings = SavingsSummary::estimate(
            &decisions,
            analysis.current_price(),
            input.history,
            input.now,
            input.timezone,
        );

        CycleOutcome {
            decisions,
            savings,
            comfort_factor,
            current_price: analysis.current.as_ref().map(|p| p.price),
            forecast: analysis.forecast,
            stats: analysis.stats,
            pattern: analysis.pattern,
        }
    }
}
