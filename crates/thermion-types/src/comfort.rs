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

/// Time-of-day comfort window parameters (local clock hours)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComfortProfileConfig {
    /// Hour the full-comfort day window begins
    pub day_start: u32,

    /// Hour the day window ends (night setback reached)
    pub day_end: u32,

    /// Length of the morning ramp ahead of `day_start` (hours)
    pub pre_heat_hours: u32,

    /// Maximum band squeeze applied at night (°C per side)
    pub night_reduction: f32,
}

impl Default for ComfortProfileConfig {
    fn default() -> Self {
        Self {
            day_start: 6,
            day_end: 22,
            pre_heat_hours: 2,
            night_reduction: 2.0,
        }
    }
}

impl ComfortProfileConfig {
    /// Hour at which the morning ramp begins, wrapped to 0..24
    pub fn wake_hour(&self) -> u32 {
        (self.day_start + 24 - self.effective_pre_heat_hours()) % 24
    }

    /// Hours between `day_end` and the next `day_start`
    pub fn night_hours(&self) -> u32 {
        (self.day_start % 24 + 24 - self.day_end % 24) % 24
    }

    /// Pre-heat length limited to the night window, so the morning ramp never
    /// starts before the evening ramp has finished
    pub fn effective_pre_heat_hours(&self) -> u32 {
        self.pre_heat_hours.min(self.night_hours())
    }
}
