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

mod optimizer;
mod tank_tier;
mod zone_comfort;

pub use optimizer::{CycleInput, CycleOutcome, LoadInput, OptimizationEngine};
pub use tank_tier::TankTierStrategy;
pub use zone_comfort::ZoneComfortStrategy;

use crate::comfort::{ComfortBand, ComfortProfile};
use crate::pricing::PriceAnalysis;
use chrono::{DateTime, Duration, Utc};
use thermion_types::{LoadConstraints, LoadId, PricePosition, ThermalModel};

/// Pre-heat window ahead of a significant price increase (hours)
pub const PRE_HEAT_WINDOW_HOURS: f32 = 3.0;

/// Pre-cool window ahead of a significant price decrease (hours)
pub const PRE_COOL_WINDOW_HOURS: f32 = 2.0;

/// Largest single lookahead adjustment (°C)
pub const MAX_LOOKAHEAD_ADJUSTMENT: f32 = 1.0;

/// A price at least this much above the current one counts as a spike
pub const SPIKE_RATIO: f32 = 1.15;

/// Everything a strategy needs to evaluate one load for one cycle
#[derive(Debug, Clone)]
pub struct SetpointContext<'a> {
    pub load: LoadId,
    pub constraints: &'a LoadConstraints,

    /// Comfort-adjusted band (equal to the constraints for the tank)
    pub band: ComfortBand,

    /// Setpoint currently commanded on the device
    pub previous_target: f32,

    pub analysis: &'a PriceAnalysis,
    pub thermal: &'a ThermalModel,
    pub comfort: &'a ComfortProfile,

    pub now: DateTime<Utc>,

    /// Fractional local clock hour of `now`
    pub local_hour: f32,

    /// Weather bias to add, `None` when not applicable to this load
    pub weather_delta: Option<f32>,
}

/// Unclamped target proposed by a strategy together with the rules that fired
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointEvaluation {
    pub strategy_name: String,
    pub target: f32,
    pub reasons: Vec<String>,
}

impl SetpointEvaluation {
    pub fn new(strategy_name: impl Into<String>, target: f32) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            target,
            reasons: Vec::new(),
        }
    }

    /// Add a non-zero adjustment and record why
    pub fn adjust(&mut self, delta: f32, reason: impl Into<String>) {
        if delta.abs() > f32::EPSILON {
            self.target += delta;
            self.reasons.push(reason.into());
        }
    }
}

/// Trait for per-load setpoint strategies
pub trait LoadStrategy: Send + Sync {
    /// Strategy name for logging and decision reasons
    fn name(&self) -> &str;

    /// Propose a raw target for the load; the engine applies bounds, step and rounding
    fn evaluate(&self, context: &SetpointContext<'_>) -> SetpointEvaluation;
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f32 {
    (to - from).num_seconds() as f32 / 3600.0
}

/// Pre-heat before a significant increase, pre-cool before a significant decrease
pub fn apply_price_lookahead(context: &SetpointContext<'_>, evaluation: &mut SetpointEvaluation) {
    let change = &context.analysis.forecast.upcoming_change;
    let Some(time) = change.time else {
        return;
    };
    let hours_until = hours_between(context.now, time).max(0.0);
    let fraction = change.change_percent.abs() / 100.0;

    if change.is_increase() && hours_until <= PRE_HEAT_WINDOW_HOURS {
        let bonus = (fraction * (PRE_HEAT_WINDOW_HOURS - hours_until) / PRE_HEAT_WINDOW_HOURS)
            .min(MAX_LOOKAHEAD_ADJUSTMENT);
        evaluation.adjust(
            bonus,
            format!(
                "pre-heat +{bonus:.2}°C before {:+.0}% price rise in {hours_until:.1}h",
                change.change_percent
            ),
        );
    } else if change.is_decrease() && hours_until <= PRE_COOL_WINDOW_HOURS {
        let reduction = (fraction * (PRE_COOL_WINDOW_HOURS - hours_until) / PRE_COOL_WINDOW_HOURS)
            .min(MAX_LOOKAHEAD_ADJUSTMENT);
        evaluation.adjust(
            -reduction,
            format!(
                "pre-cool -{reduction:.2}°C before {:+.0}% price drop in {hours_until:.1}h",
                change.change_percent
            ),
        );
    }
}

/// Ramp up ahead of the comfort window while the price is low.
///
/// The ramp runs twice as fast when a price spike is forecast around day start.
pub fn apply_wake_ramp(context: &SetpointContext<'_>, evaluation: &mut SetpointEvaluation) {
    let pre_heat = context.comfort.config().effective_pre_heat_hours() as f32;
    if pre_heat <= 0.0 || context.analysis.position() != PricePosition::Low {
        return;
    }

    let hours_until_wake = context.comfort.hours_until_day_start(context.local_hour);
    if hours_until_wake <= 0.0 || hours_until_wake > pre_heat {
        return;
    }

    let spike = spike_near_day_start(context, hours_until_wake);
    let rate = if spike { 1.0 } else { 0.5 };
    let bonus = rate * (pre_heat - hours_until_wake) / pre_heat;
    let note = if spike { " (price spike at wake)" } else { "" };
    evaluation.adjust(
        bonus,
        format!("wake-up ramp +{bonus:.2}°C, {hours_until_wake:.1}h to comfort window{note}"),
    );
}

fn spike_near_day_start(context: &SetpointContext<'_>, hours_until_wake: f32) -> bool {
    let current = context.analysis.current_price();
    if current <= 0.0 {
        return false;
    }

    let day_start =
        context.now + Duration::milliseconds((hours_until_wake * 3_600_000.0).round() as i64);
    let tolerance = Duration::hours(1);
    context.analysis.series.iter().any(|p| {
        (p.time - day_start).abs() <= tolerance && p.price >= current * SPIKE_RATIO
    })
}

/// Add the weather bias when it applies to this load
pub fn apply_weather(context: &SetpointContext<'_>, evaluation: &mut SetpointEvaluation) {
    if let Some(delta) = context.weather_delta {
        evaluation.adjust(delta, format!("weather {delta:+.1}°C"));
    }
}

/// Target after bounds, step limit and rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalTarget {
    pub target: f32,
    pub clamped: bool,
    pub step_limited: bool,
}

/// Clamp `raw` to the load bounds, limit the move from `previous` to one
/// step and round to the configured increment without leaving either window.
///
/// When `previous` lies outside the bounds, the bounds win.
pub fn finalize_target(raw: f32, constraints: &LoadConstraints, previous: f32) -> FinalTarget {
    let previous = if previous.is_finite() {
        previous
    } else {
        constraints.midpoint()
    };
    let raw = if raw.is_finite() { raw } else { previous };

    let bounded = constraints.clamp(raw);
    let clamped = (bounded - raw).abs() > f32::EPSILON;

    let step = constraints.step.max(0.0);
    let lo = constraints.clamp(previous - step);
    let hi = constraints.clamp(previous + step);
    let windowed = bounded.clamp(lo, hi);
    let step_limited = (windowed - bounded).abs() > f32::EPSILON;

    FinalTarget {
        target: round_within(windowed, constraints.round_to, lo, hi),
        clamped,
        step_limited,
    }
}

/// Round to the nearest multiple of `increment`, falling back to floor/ceil
/// (or the unrounded value) so the result stays inside [lo, hi]
pub fn round_within(value: f32, increment: f32, lo: f32, hi: f32) -> f32 {
    const TOLERANCE: f32 = 1e-4;

    if increment <= 0.0 {
        return value;
    }

    let fits = |v: f32| v >= lo - TOLERANCE && v <= hi + TOLERANCE;
    let units = value / increment;
    [units.round(), units.floor(), units.ceil()]
        .into_iter()
        .map(|u| u * increment)
        .find(|v| fits(*v))
        .unwrap_or(value)
}
