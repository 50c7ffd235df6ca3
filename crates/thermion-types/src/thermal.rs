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

/// Empirical responsiveness coefficient linking price swings to setpoint swings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawThermalModel")]
pub struct ThermalModel {
    k: f32,
    last_calibrated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawThermalModel {
    k: f32,
    #[serde(default)]
    last_calibrated_at: Option<DateTime<Utc>>,
}

impl From<RawThermalModel> for ThermalModel {
    fn from(raw: RawThermalModel) -> Self {
        let mut model = Self::new(raw.k);
        model.last_calibrated_at = raw.last_calibrated_at;
        model
    }
}

impl ThermalModel {
    pub const MIN_K: f32 = 0.1;
    pub const MAX_K: f32 = 1.0;
    pub const DEFAULT_K: f32 = 0.5;

    /// Build a model, clamping `k` into [`MIN_K`, `MAX_K`]
    pub fn new(k: f32) -> Self {
        Self {
            k: Self::clamp_k(k),
            last_calibrated_at: None,
        }
    }

    pub fn clamp_k(k: f32) -> f32 {
        if k.is_nan() {
            Self::DEFAULT_K
        } else {
            k.clamp(Self::MIN_K, Self::MAX_K)
        }
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    pub fn last_calibrated_at(&self) -> Option<DateTime<Utc>> {
        self.last_calibrated_at
    }

    /// Store a recalibrated coefficient (clamped)
    pub fn set_k(&mut self, k: f32, calibrated_at: DateTime<Utc>) {
        self.k = Self::clamp_k(k);
        self.last_calibrated_at = Some(calibrated_at);
    }

    /// Multiplier on the price-to-temperature term. 1.0 at the default K.
    pub fn price_gain(&self) -> f32 {
        self.k / Self::DEFAULT_K
    }
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}
