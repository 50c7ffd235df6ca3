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

use crate::load::LoadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_applied() -> bool {
    true
}

/// One setpoint change computed for a single load in a single cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationDecision {
    pub load: LoadId,

    /// Setpoint before the cycle (°C)
    pub from_temp: f32,

    /// Setpoint chosen by the cycle (°C)
    pub to_temp: f32,

    /// Rules that fired, human readable
    pub reason: String,

    pub timestamp: DateTime<Utc>,

    /// Whether the device accepted the new setpoint
    #[serde(default = "default_applied")]
    pub applied: bool,
}

impl OptimizationDecision {
    pub fn new(
        load: LoadId,
        from_temp: f32,
        to_temp: f32,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            load,
            from_temp,
            to_temp,
            reason: reason.into(),
            timestamp,
            applied: true,
        }
    }

    pub fn delta(&self) -> f32 {
        self.to_temp - self.from_temp
    }

    pub fn is_change(&self) -> bool {
        self.delta().abs() > f32::EPSILON
    }
}
