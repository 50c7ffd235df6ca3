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

use anyhow::Result;
use async_trait::async_trait;
use thermion_types::{
    CalibrationResult, HistoricalEntry, LoadId, LoadState, PricePoint, WeatherAdjustment,
    WeatherQuery,
};

// ============= Collaborator Traits =============

/// Trait for reading energy prices
#[async_trait]
pub trait PriceDataSource: Send + Sync {
    /// Read the current price series (today plus tomorrow when published)
    async fn read_prices(&self) -> Result<Vec<PricePoint>>;

    /// Check if price source is available
    async fn health_check(&self) -> Result<bool>;

    /// Get price source name (for logging)
    fn name(&self) -> &str;
}

/// Trait for weather-derived setpoint bias
#[async_trait]
pub trait WeatherDataSource: Send + Sync {
    /// Additive bias for one load; opaque to the optimizer
    async fn adjustment(&self, query: &WeatherQuery) -> Result<WeatherAdjustment>;

    fn name(&self) -> &str;
}

/// Trait for reading and commanding thermal loads
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn read_state(&self, load: LoadId) -> Result<LoadState>;

    /// Command a new setpoint. An error means the device did not accept it.
    async fn write_target(&self, load: LoadId, target: f32) -> Result<()>;

    fn name(&self) -> &str;
}

/// Trait for persisting cycle history and calibration results
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load persisted entries, oldest first. Empty when nothing was stored yet.
    async fn load(&self) -> Result<Vec<HistoricalEntry>>;

    /// Replace the persisted buffer with `entries`
    async fn save(&self, entries: &[HistoricalEntry]) -> Result<()>;

    async fn record_calibration(&self, result: &CalibrationResult) -> Result<()>;

    async fn latest_calibration(&self) -> Result<Option<CalibrationResult>>;
}
