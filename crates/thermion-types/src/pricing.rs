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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= Price Input =============

/// Discrete price tier as reported by the price source (Tibber/Nord Pool style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    VeryCheap,
    Cheap,
    Normal,
    Expensive,
    VeryExpensive,
}

impl PriceLevel {
    /// Collapse the tier onto the three-way price position used by the optimizer
    pub fn position(self) -> PricePosition {
        match self {
            Self::VeryCheap | Self::Cheap => PricePosition::Low,
            Self::Normal => PricePosition::Medium,
            Self::Expensive | Self::VeryExpensive => PricePosition::High,
        }
    }

    /// Get config/wire string value
    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::VeryCheap => "very_cheap",
            Self::Cheap => "cheap",
            Self::Normal => "normal",
            Self::Expensive => "expensive",
            Self::VeryExpensive => "very_expensive",
        }
    }
}

impl fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_config_value())
    }
}

impl FromStr for PriceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "very_cheap" => Ok(Self::VeryCheap),
            "cheap" | "low" => Ok(Self::Cheap),
            "normal" | "medium" => Ok(Self::Normal),
            "expensive" | "high" => Ok(Self::Expensive),
            "very_expensive" => Ok(Self::VeryExpensive),
            _ => Err(anyhow::anyhow!(
                "Unknown price level: '{}'. Supported levels: very_cheap, cheap, normal, expensive, very_expensive",
                s
            )),
        }
    }
}

/// A single price observation (hourly or finer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Start of the interval this price applies to
    pub time: DateTime<Utc>,

    /// Energy price (currency/kWh)
    pub price: f32,

    /// Optional discrete tier supplied by the price source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<PriceLevel>,
}

impl PricePoint {
    pub fn new(time: DateTime<Utc>, price: f32) -> Self {
        Self {
            time,
            price,
            level: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: PriceLevel) -> Self {
        self.level = Some(level);
        self
    }
}

// ============= Derived Analytics =============

/// Summary statistics over a price series. All-zero for an empty series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceSeriesStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    pub median: f32,
    pub std_dev: f32,
    pub p25: f32,
    pub p75: f32,
    /// std_dev / avg
    pub volatility: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// A strict local maximum or minimum (interior points only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceExtremum {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub price: f32,
}

/// Maximal run of same-direction price deltas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    pub direction: TrendDirection,
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_price: f32,
    pub end_price: f32,
    /// (end - start) / start * 100, 0 when the start price is 0
    pub change_percent: f32,
}

impl PriceTrend {
    /// Number of deltas covered by this trend
    pub fn span(&self) -> usize {
        self.end_index - self.start_index
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricePattern {
    pub peaks: Vec<PriceExtremum>,
    pub valleys: Vec<PriceExtremum>,
    pub trends: Vec<PriceTrend>,
}

/// Where the current price sits relative to the forecast window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePosition {
    Low,
    Medium,
    High,
}

impl fmt::Display for PricePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Largest price move expected within the short lookahead window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpcomingChange {
    /// |change_percent| >= 15
    pub significant: bool,

    /// Percent change relative to the current price (positive = increase)
    pub change_percent: f32,

    /// When the change takes effect
    pub time: Option<DateTime<Utc>>,

    /// Price after the change
    pub price: Option<f32>,
}

impl UpcomingChange {
    pub fn is_increase(&self) -> bool {
        self.significant && self.change_percent > 0.0
    }

    pub fn is_decrease(&self) -> bool {
        self.significant && self.change_percent < 0.0
    }
}

/// Forward-looking summary of the price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceForecast {
    /// False for the "no future data" sentinel
    pub has_future_data: bool,

    /// Price in effect now, if the series covers the current time
    pub current_price: Option<f32>,

    pub current_position: PricePosition,

    pub recommendation: String,

    pub upcoming_change: UpcomingChange,

    /// Up to 3 cheapest points within the next 24 hours (cheapest first)
    pub best_times: Vec<PricePoint>,

    /// Up to 3 most expensive points within the next 24 hours (most expensive first)
    pub worst_times: Vec<PricePoint>,
}

impl PriceForecast {
    /// Sentinel returned when the series has nothing after the current hour
    pub fn no_future_data(current_price: Option<f32>, position: PricePosition) -> Self {
        Self {
            has_future_data: false,
            current_price,
            current_position: position,
            recommendation: "No future price data available".to_string(),
            upcoming_change: UpcomingChange::default(),
            best_times: Vec::new(),
            worst_times: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_level_parsing() {
        assert_eq!("cheap".parse::<PriceLevel>().unwrap(), PriceLevel::Cheap);
        assert_eq!(
            "VERY_EXPENSIVE".parse::<PriceLevel>().unwrap(),
            PriceLevel::VeryExpensive
        );
        assert_eq!(
            "very cheap".parse::<PriceLevel>().unwrap(),
            PriceLevel::VeryCheap
        );
        assert_eq!("Normal".parse::<PriceLevel>().unwrap(), PriceLevel::Normal);
        assert!("bogus".parse::<PriceLevel>().is_err());
    }

    #[test]
    fn test_price_level_position() {
        assert_eq!(PriceLevel::VeryCheap.position(), PricePosition::Low);
        assert_eq!(PriceLevel::Normal.position(), PricePosition::Medium);
        assert_eq!(PriceLevel::Expensive.position(), PricePosition::High);
    }

    #[test]
    fn test_price_point_serde_skips_missing_level() {
        let point = PricePoint::new(Utc::now(), 0.25);
        let json = serde_json::to_string(&point).unwrap();
        assert!(!json.contains("level"));

        let with_level = point.with_level(PriceLevel::Cheap);
        let json = serde_json::to_string(&with_level).unwrap();
        assert!(json.contains("\"cheap\""));
    }

    #[test]
    fn test_no_future_data_sentinel() {
        let forecast = PriceForecast::no_future_data(Some(0.2), PricePosition::Medium);
        assert!(!forecast.has_future_data);
        assert!(!forecast.upcoming_change.significant);
        assert!(forecast.best_times.is_empty());
        assert!(forecast.worst_times.is_empty());
    }
}
