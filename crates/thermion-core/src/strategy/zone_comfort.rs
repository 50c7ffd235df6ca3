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

/// Discrete bias per price position (°C)
const LOW_PRICE_BIAS: f32 = 1.0;
const MEDIUM_PRICE_BIAS: f32 = -0.5;
const HIGH_PRICE_BIAS: f32 = -2.0;

/// Comfort- and price-weighted setpoint for a heating zone.
///
/// The target starts from the middle of the comfort band and moves toward the
/// top of the band when the price is at the bottom of its range (and vice
/// versa), scaled by the responsiveness coefficient.
#[derive(Debug, Clone, Default)]
pub struct ZoneComfortStrategy;

impl ZoneComfortStrategy {
    pub fn new() -> Self {
        Self
    }

    fn position_bias(position: PricePosition) -> f32 {
        match position {
            PricePosition::Low => LOW_PRICE_BIAS,
            PricePosition::Medium => MEDIUM_PRICE_BIAS,
            PricePosition::High => HIGH_PRICE_BIAS,
        }
    }
}

impl LoadStrategy for ZoneComfortStrategy {
    fn name(&self) -> &str {
        "Zone-Comfort"
    }

    fn evaluate(&self, context: &SetpointContext<'_>) -> SetpointEvaluation {
        let band = context.band;
        let normalized = context.analysis.normalized_price();
        let inverted = 1.0 - normalized;
        let gain = context.thermal.price_gain();

        let base = band.midpoint() + (inverted - 0.5) * band.span() * gain;
        let mut evaluation = SetpointEvaluation::new(self.name(), base);
        if context.analysis.is_available() {
            evaluation.reasons.push(format!(
                "price at {:.0}% of range (K={:.2}) -> {base:.2}°C",
                normalized * 100.0,
                context.thermal.k()
            ));
        } else {
            evaluation
                .reasons
                .push(format!("no current price, neutral target {base:.2}°C"));
        }

        let position = context.analysis.position();
        let bias = Self::position_bias(position);
        evaluation.adjust(bias, format!("{position} price {bias:+.1}°C"));

        apply_price_lookahead(context, &mut evaluation);
        apply_wake_ramp(context, &mut evaluation);
        apply_weather(context, &mut evaluation);

        evaluation
    }
}
