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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Independently controllable thermal output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadId {
    Zone1,
    Zone2,
    Tank,
}

impl LoadId {
    pub fn all() -> [LoadId; 3] {
        [Self::Zone1, Self::Zone2, Self::Tank]
    }

    /// Heating zones take part in comfort scoring, the tank does not
    pub fn is_zone(self) -> bool {
        matches!(self, Self::Zone1 | Self::Zone2)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Zone1 => "Zone 1",
            Self::Zone2 => "Zone 2",
            Self::Tank => "Hot water tank",
        }
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zone1 => write!(f, "zone1"),
            Self::Zone2 => write!(f, "zone2"),
            Self::Tank => write!(f, "tank"),
        }
    }
}

fn default_round_to() -> f32 {
    0.5
}

/// Setpoint limits for a single load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadConstraints {
    /// Lowest allowed setpoint (°C)
    pub min: f32,

    /// Highest allowed setpoint (°C)
    pub max: f32,

    /// Largest change per cycle (°C)
    pub step: f32,

    /// Rounding increment for commanded setpoints (°C)
    #[serde(default = "default_round_to")]
    pub round_to: f32,
}

impl LoadConstraints {
    pub fn new(min: f32, max: f32, step: f32) -> Self {
        Self {
            min,
            max,
            step,
            round_to: default_round_to(),
        }
    }

    /// Typical space-heating zone: 18-22 °C, 0.5 °C per hour
    pub fn zone_default() -> Self {
        Self::new(18.0, 22.0, 0.5)
    }

    /// Typical domestic hot water tank: 45-60 °C, 5 °C per hour
    pub fn tank_default() -> Self {
        Self::new(45.0, 60.0, 5.0)
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Snapshot of a load as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadState {
    /// Measured temperature (°C)
    pub current_temp: f32,

    /// Setpoint currently commanded (°C)
    pub current_target: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_defaults_when_missing() {
        let constraints: LoadConstraints =
            serde_json::from_str(r#"{"min": 18.0, "max": 22.0, "step": 0.5}"#).unwrap();
        assert!((constraints.round_to - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_and_midpoint() {
        let constraints = LoadConstraints::zone_default();
        assert!((constraints.midpoint() - 20.0).abs() < f32::EPSILON);
        assert!((constraints.clamp(25.0) - 22.0).abs() < f32::EPSILON);
        assert!((constraints.clamp(10.0) - 18.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_id_serde() {
        assert_eq!(serde_json::to_string(&LoadId::Zone2).unwrap(), "\"zone2\"");
        assert!(LoadId::Zone1.is_zone());
        assert!(!LoadId::Tank.is_zone());
    }
}
