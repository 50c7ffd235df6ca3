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

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ha::client::HomeAssistantClient;
use crate::ha::types::value_as_f32;
use thermion_core::WeatherDataSource;
use thermion_types::{WeatherAdjustment, WeatherQuery};

const COLD_THRESHOLD: f32 = 0.0;
const SEVERE_COLD_THRESHOLD: f32 = -5.0;
const WARM_THRESHOLD: f32 = 15.0;
const FORECAST_DROP_THRESHOLD: f32 = 5.0;
const FORECAST_WINDOW_HOURS: i64 = 6;
const MAX_ADJUSTMENT: f32 = 2.0;

/// One hourly forecast entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub temperature: f32,
}

/// Weather bias from a `weather.*` entity
pub struct HaWeatherAdapter {
    client: Arc<HomeAssistantClient>,
    entity_id: String,
}

impl std::fmt::Debug for HaWeatherAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaWeatherAdapter")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}

impl HaWeatherAdapter {
    pub fn new(client: Arc<HomeAssistantClient>, entity_id: impl Into<String>) -> Self {
        Self {
            client,
            entity_id: entity_id.into(),
        }
    }

    /// Hourly forecast via `weather.get_forecasts` (entities no longer carry a
    /// `forecast` attribute since HA 2024.3)
    async fn fetch_forecast(&self) -> Result<Vec<ForecastPoint>> {
        let response = self
            .client
            .call_service_with_response(
                "weather.get_forecasts",
                json!({"entity_id": self.entity_id, "type": "hourly"}),
            )
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        let entries = response
            .get(&self.entity_id)
            .and_then(|v| v.get("forecast"))
            .and_then(Value::as_array)
            .context("Forecast response has no forecast list")?;
        Ok(parse_forecast(entries))
    }
}

#[async_trait]
impl WeatherDataSource for HaWeatherAdapter {
    async fn adjustment(&self, query: &WeatherQuery) -> Result<WeatherAdjustment> {
        let state = self
            .client
            .get_state(&self.entity_id)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to read weather entity: {}", self.entity_id))?;

        if !state.is_available() {
            anyhow::bail!("Weather entity {} is {}", self.entity_id, state.state);
        }

        let outdoor = state.attribute_f32("temperature");

        let forecast = match state.attributes.get("forecast").and_then(Value::as_array) {
            Some(entries) => parse_forecast(entries),
            None => self.fetch_forecast().await.unwrap_or_else(|e| {
                warn!("⚠️ [WEATHER] Forecast unavailable for {}: {e:#}", self.entity_id);
                Vec::new()
            }),
        };

        let adjustment = compute_adjustment(outdoor, &forecast, query);
        debug!(
            "🌦️ [WEATHER] outdoor {:?}°C, {} forecast points → {:+.1}°C ({})",
            outdoor,
            forecast.len(),
            adjustment.adjustment_degrees,
            adjustment.reason
        );
        Ok(adjustment)
    }

    fn name(&self) -> &str {
        "HaWeather"
    }
}

/// Parse `[{datetime, temperature}, ...]`, dropping malformed entries
pub fn parse_forecast(entries: &[Value]) -> Vec<ForecastPoint> {
    entries
        .iter()
        .filter_map(|entry| {
            let time = entry
                .get("datetime")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
                .with_timezone(&Utc);
            let temperature = entry.get("temperature").and_then(value_as_f32)?;
            Some(ForecastPoint { time, temperature })
        })
        .collect()
}

/// Additive setpoint bias from the outdoor temperature and the short forecast
pub fn compute_adjustment(
    outdoor: Option<f32>,
    forecast: &[ForecastPoint],
    query: &WeatherQuery,
) -> WeatherAdjustment {
    let Some(outdoor) = outdoor else {
        return WeatherAdjustment::none("no outdoor temperature");
    };

    let mut degrees: f32 = 0.0;
    let mut reasons = Vec::new();

    if outdoor <= SEVERE_COLD_THRESHOLD {
        degrees += 1.0;
        reasons.push(format!("severe cold {outdoor:.1}°C (+1.0)"));
    } else if outdoor <= COLD_THRESHOLD {
        degrees += 0.5;
        reasons.push(format!("freezing {outdoor:.1}°C (+0.5)"));
    } else if outdoor >= WARM_THRESHOLD {
        degrees -= 0.5;
        reasons.push(format!("mild {outdoor:.1}°C (-0.5)"));
    }

    let window_end = query.now + Duration::hours(FORECAST_WINDOW_HOURS);
    let coldest = forecast
        .iter()
        .filter(|p| p.time > query.now && p.time <= window_end)
        .map(|p| p.temperature)
        .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |a| a.min(t))));

    if let Some(coldest) = coldest {
        let drop = outdoor - coldest;
        if drop >= FORECAST_DROP_THRESHOLD && query.current_price < query.avg_price {
            degrees += 0.5;
            reasons.push(format!(
                "{drop:.1}°C drop within {FORECAST_WINDOW_HOURS}h at below-average price (+0.5)"
            ));
        }
    }

    let reason = if reasons.is_empty() {
        "no weather adjustment".to_owned()
    } else {
        reasons.join("; ")
    };

    WeatherAdjustment {
        adjustment_degrees: degrees.clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT),
        reason,
        outdoor_temp: Some(outdoor),
    }
}
