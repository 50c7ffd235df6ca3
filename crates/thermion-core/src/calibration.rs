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

//! Periodic re-estimation of the responsiveness coefficient K.

use crate::history::DecisionHistory;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thermion_types::{CalibrationResult, HistoricalEntry, ThermalModel};

/// Entries required before calibration is attempted (one day of hourly cycles)
pub const MIN_HISTORY_FOR_CALIBRATION: usize = 24;

/// Desired °C of setpoint movement per unit of price movement
pub const TARGET_RESPONSE: f32 = 0.5;

/// Fraction of the observed correction applied per calibration
pub const LEARNING_RATE: f32 = 0.2;

/// Relative perturbation range used when the history carries no signal
const PERTURBATION_MIN: f32 = 0.9;
const PERTURBATION_SPAN: f32 = 0.2;

/// Outcome of a calibration run
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// K re-estimated from observed responsiveness
    Calibrated(CalibrationResult),

    /// No usable price/target signal; K randomly perturbed within ±10%
    InsufficientSignal(CalibrationResult),

    /// Too few entries; K left untouched
    InsufficientHistory { entries: usize, required: usize },
}

impl CalibrationOutcome {
    pub fn success(&self) -> bool {
        !matches!(self, Self::InsufficientHistory { .. })
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        match self {
            Self::Calibrated(result) | Self::InsufficientSignal(result) => Some(result),
            Self::InsufficientHistory { .. } => None,
        }
    }
}

/// Observed setpoint/price responsiveness across consecutive history pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseSample {
    /// Σ|Δtarget| / Σ|Δprice|, `None` when no pair had a price change
    pub avg_response: Option<f32>,
    pub samples: usize,
}

/// Measure how strongly primary-zone targets followed price changes.
///
/// Pairs with no price change or without a primary-zone target are skipped.
pub fn measure_response<'a>(
    entries: impl IntoIterator<Item = &'a HistoricalEntry>,
) -> ResponseSample {
    let entries: Vec<&HistoricalEntry> = entries.into_iter().collect();
    let mut total_target_delta = 0.0;
    let mut total_price_delta = 0.0;
    let mut samples = 0;

    for pair in entries.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let price_delta = (current.price_now - previous.price_now).abs();
        if price_delta <= f32::EPSILON {
            continue;
        }
        let (Some(from), Some(to)) = (previous.primary_target(), current.primary_target()) else {
            continue;
        };

        total_target_delta += (to - from).abs();
        total_price_delta += price_delta;
        samples += 1;
    }

    let avg_response = if samples > 0 && total_price_delta > 0.0 {
        Some(total_target_delta / total_price_delta)
    } else {
        None
    };

    ResponseSample {
        avg_response,
        samples,
    }
}

/// Recomputes K from recorded history.
///
/// The random source is injectable so the no-signal fallback is reproducible.
pub struct CalibrationService {
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for CalibrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationService").finish_non_exhaustive()
    }
}

impl Default for CalibrationService {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationService {
    /// Service seeded from OS entropy
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    /// Deterministic service for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self { rng }
    }

    /// Run one calibration against `history`, updating `thermal` on success
    pub fn run_calibration(
        &mut self,
        history: &DecisionHistory,
        thermal: &mut ThermalModel,
        now: DateTime<Utc>,
    ) -> CalibrationOutcome {
        if !history.has_sufficient_data(MIN_HISTORY_FOR_CALIBRATION) {
            return CalibrationOutcome::InsufficientHistory {
                entries: history.len(),
                required: MIN_HISTORY_FOR_CALIBRATION,
            };
        }

        let old_k = thermal.k();
        let sample = measure_response(history.iter());

        let outcome = match sample.avg_response {
            Some(avg) if avg > 0.0 => {
                let correction = (TARGET_RESPONSE / avg - 1.0) * LEARNING_RATE;
                let new_k = ThermalModel::clamp_k(old_k * (1.0 + correction));
                CalibrationOutcome::Calibrated(CalibrationResult {
                    old_k,
                    new_k,
                    avg_response: Some(avg),
                    samples: sample.samples,
                    analysis: format!(
                        "Observed {avg:.3} °C per price unit over {} samples \
                         (target {TARGET_RESPONSE:.1}); K {old_k:.3} -> {new_k:.3}",
                        sample.samples
                    ),
                    timestamp: now,
                })
            }
            _ => {
                let factor = PERTURBATION_MIN + self.rng.gen_range(0.0f32..1.0) * PERTURBATION_SPAN;
                let new_k = ThermalModel::clamp_k(old_k * factor);
                let why = if sample.samples == 0 {
                    "no price changes in history".to_string()
                } else {
                    format!("setpoints did not follow {} price changes", sample.samples)
                };
                CalibrationOutcome::InsufficientSignal(CalibrationResult {
                    old_k,
                    new_k,
                    avg_response: sample.avg_response,
                    samples: sample.samples,
                    analysis: format!(
                        "Insufficient signal ({why}); K {old_k:.3} -> {new_k:.3} \
                         by x{factor:.3} perturbation"
                    ),
                    timestamp: now,
                })
            }
        };

        if let Some(result) = outcome.result() {
            thermal.set_k(result.new_k, now);
        }
        outcome
    }
}
