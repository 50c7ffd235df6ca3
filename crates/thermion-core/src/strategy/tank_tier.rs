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
    LoadStrategy, SetpointContext, SetpointEvaluation, apply_price_lookahead, apply_wake_ramp,
    apply_weather,
};
use thermion_types::PricePosition;

/// Three-tier rule for the hot water tank: store heat when cheap, coast when expensive
#[derive(Debug, Clone, Default)]
pub struct TankTierStrategy;

impl TankTierStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl LoadStrategy for TankTierStrategy {
    fn name(&self) -> &str {
        "Tank-Tier"
    }

    fn evaluate(&self, context: &SetpointContext<'_>) -> SetpointEvaluation {
        let constraints = context.constraints;
        let position = context.analysis.position();
        let (base, reason) = match position {
            PricePosition::Low => (constraints.max, "low price, charge tank to max"),
            PricePosition::High => (constraints.min, "high price, let tank coast to min"),
            PricePosition::Medium => (constraints.midpoint(), "medium price, hold tank midpoint"),
        };

        let mut evaluation = SetpointEvaluation::new(self.name(), base);
        evaluation.reasons.push(format!("{reason} ({base:.1}°C)"));

        apply_price_lookahead(context, &mut evaluation);
        apply_wake_ramp(context, &mut evaluation);
        apply_weather(context, &mut evaluation);

        evaluation
    }
}
