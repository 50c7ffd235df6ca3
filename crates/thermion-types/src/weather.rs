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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Additive setpoint bias supplied by the weather source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherAdjustment {
    /// Bias in °C, applied unchanged by the optimizer
    pub adjustment_degrees: f32,

    pub reason: String,

    /// Outdoor temperature the bias was derived from
    #[serde(default)]
    pub outdoor_temp: Option<f32>,
}

impl WeatherAdjustment {
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            adjustment_degrees: 0.0,
            reason: reason.into(),
            outdoor_temp: None,
        }
    }
}

/// Inputs handed to the weather source for one load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub current_temp: f32,
    pub target_temp: f32,
    pub current_price: f32,
    pub avg_price: f32,
    pub now: DateTime<Utc>,
}
