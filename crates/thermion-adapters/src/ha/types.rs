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
use serde_json::Value;

/// Entity state as returned by `GET /api/states/<entity_id>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub last_changed: String,
    #[serde(default)]
    pub last_updated: String,
}

impl HaEntityState {
    /// `unavailable` / `unknown` states carry no usable attributes
    pub fn is_available(&self) -> bool {
        !matches!(self.state.as_str(), "unavailable" | "unknown" | "")
    }

    /// Numeric attribute, accepting numbers and numeric strings
    pub fn attribute_f32(&self, key: &str) -> Option<f32> {
        value_as_f32(self.attributes.get(key)?)
    }

    /// Numeric entity state
    pub fn state_f32(&self) -> Option<f32> {
        self.state.trim().parse::<f32>().ok().filter(|v| v.is_finite())
    }

    /// Entity domain (`climate`, `water_heater`, ...)
    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id)
    }
}

pub(crate) fn value_as_f32(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub(crate) fn entity_domain(entity_id: &str) -> &str {
    entity_id.split_once('.').map_or("", |(domain, _)| domain)
}
