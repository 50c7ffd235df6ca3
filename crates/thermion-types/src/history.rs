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

use crate::decision::OptimizationDecision;
use crate::load::LoadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weather context captured alongside a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub outdoor_temp: f32,
    pub adjustment_degrees: f32,
    pub reason: String,
}

/// Immutable record of one completed decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    pub timestamp: DateTime<Utc>,

    pub decisions: Vec<OptimizationDecision>,

    /// Price in effect during the cycle
    pub price_now: f32,

    /// Primary zone measured temperature (°C)
    pub indoor_temp: f32,

    #[serde(default)]
    pub outdoor_temp: Option<f32>,

    /// Estimated savings for this hour (currency)
    pub savings: f32,

    /// Comfort impact score for this hour
    pub comfort: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
}

impl HistoricalEntry {
    /// Target of the primary zone, falling back to any heating zone
    pub fn primary_target(&self) -> Option<f32> {
        self.decisions
            .iter()
            .find(|d| d.load == LoadId::Zone1)
            .or_else(|| self.decisions.iter().find(|d| d.load.is_zone()))
            .map(|d| d.to_temp)
    }
}

/// Outcome of one responsiveness calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub old_k: f32,
    pub new_k: f32,

    /// Observed target/price response, absent when the history carried no price signal
    #[serde(default)]
    pub avg_response: Option<f32>,

    /// Number of history pairs that contributed
    pub samples: usize,

    pub analysis: String,

    pub timestamp: DateTime<Utc>,
}
