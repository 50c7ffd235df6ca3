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

pub mod comfort;
pub mod decision;
pub mod history;
pub mod load;
pub mod pricing;
pub mod thermal;
pub mod weather;

// Re-export common types for convenience
pub use comfort::ComfortProfileConfig;
pub use decision::OptimizationDecision;
pub use history::{CalibrationResult, HistoricalEntry, WeatherSnapshot};
pub use load::{LoadConstraints, LoadId, LoadState};
pub use pricing::{
    PriceExtremum, PriceForecast, PriceLevel, PricePattern, PricePoint, PricePosition,
    PriceSeriesStats, PriceTrend, TrendDirection, UpcomingChange,
};
pub use thermal::ThermalModel;
pub use weather::{WeatherAdjustment, WeatherQuery};
