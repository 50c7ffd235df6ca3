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
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ha::client::HomeAssistantClient;
use crate::ha::types::{HaEntityState, entity_domain, value_as_f32};
use thermion_core::pricing::normalize_series;
use thermion_core::{DeviceGateway, PriceDataSource};
use thermion_types::{LoadId, LoadState, PriceLevel, PricePoint};

// ============= Price Adapter =============

/// Price adapter reading a Home Assistant price sensor (Nord Pool, Tibber,
/// ENTSO-E and Czech spot integrations expose compatible attribute shapes).
pub struct HaPriceAdapter {
    client: Arc<HomeAssistantClient>,
    entity_id: String,
    tomorrow_entity_id: Option<String>,
    /// Timezone used to anchor day arrays, synchronized from Home Assistant
    timezone: Arc<RwLock<Option<Tz>>>,
}

impl std::fmt::Debug for HaPriceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaPriceAdapter")
            .field("entity_id", &self.entity_id)
            .field("tomorrow_entity_id", &self.tomorrow_entity_id)
            .field("timezone", &*self.timezone.read())
            .finish_non_exhaustive()
    }
}

impl HaPriceAdapter {
    pub fn new(client: Arc<HomeAssistantClient>, entity_id: impl Into<String>) -> Self {
        Self {
            client,
            entity_id: entity_id.into(),
            tomorrow_entity_id: None,
            timezone: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an adapter with separate today and tomorrow sensors
    pub fn with_tomorrow_sensor(
        client: Arc<HomeAssistantClient>,
        today_entity_id: impl Into<String>,
        tomorrow_entity_id: impl Into<String>,
    ) -> Self {
        let mut adapter = Self::new(client, today_entity_id);
        adapter.tomorrow_entity_id = Some(tomorrow_entity_id.into());
        adapter
    }

    /// Update the timezone used for price parsing
    pub fn set_timezone(&self, tz: Option<Tz>) {
        let mut timezone = self.timezone.write();
        if *timezone != tz {
            info!(
                "🌍 [HaPriceAdapter] Timezone updated: {:?} -> {:?}",
                timezone.map(|t| t.name()),
                tz.map(|t| t.name())
            );
        }
        *timezone = tz;
    }

    /// Shared timezone handle for external synchronization
    pub fn timezone_handle(&self) -> Arc<RwLock<Option<Tz>>> {
        Arc::clone(&self.timezone)
    }

    fn get_timezone(&self) -> Option<Tz> {
        *self.timezone.read()
    }
}

#[async_trait]
impl PriceDataSource for HaPriceAdapter {
    async fn read_prices(&self) -> Result<Vec<PricePoint>> {
        let timezone = self.get_timezone();
        debug!(
            "💰 [ADAPTER] Reading prices from: {} (timezone: {})",
            self.entity_id,
            timezone.map_or("UTC (not set)", |tz| tz.name())
        );

        let now = Utc::now();
        let state = self
            .client
            .get_state(&self.entity_id)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to read price entity: {}", self.entity_id))?;

        let mut prices = parse_price_entity(&state, timezone, now)
            .with_context(|| format!("Failed to parse price entity: {}", self.entity_id))?;

        if let Some(tomorrow_entity_id) = &self.tomorrow_entity_id {
            debug!("💰 [ADAPTER] Also reading tomorrow prices from: {tomorrow_entity_id}");
            match self.client.get_state(tomorrow_entity_id).await {
                Ok(tomorrow_state) => {
                    match parse_entity_at(&tomorrow_state, timezone, now, 1) {
                        Ok(tomorrow) => prices.extend(tomorrow),
                        Err(e) => {
                            warn!("⚠️ Failed to parse tomorrow prices (using today only): {e:#}");
                        }
                    }
                }
                Err(e) => warn!("⚠️ Failed to fetch tomorrow prices (using today only): {e}"),
            }
        }

        let prices = normalize_series(&prices);
        if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
            debug!(
                "✅ [ADAPTER] Parsed {} price points ({} .. {})",
                prices.len(),
                first.time.format("%Y-%m-%d %H:%M"),
                last.time.format("%Y-%m-%d %H:%M")
            );
        } else {
            warn!("⚠️ [ADAPTER] Price entity {} carries no prices", self.entity_id);
        }
        Ok(prices)
    }

    async fn health_check(&self) -> Result<bool> {
        self.client
            .get_state(&self.entity_id)
            .await
            .map(|state| state.is_available())
            .map_err(|e| anyhow::anyhow!(e))
    }

    fn name(&self) -> &str {
        "HaPrice"
    }
}

/// Parse a price entity into an unsorted list of price points.
///
/// Supported attribute shapes, tried in order:
/// 1. `raw_today` / `raw_tomorrow`: arrays of `{start|startsAt|time, value|price|total, level?}`
/// 2. `prices`: a single array of the same objects
/// 3. `today` / `tomorrow`: arrays of plain numbers, one per interval from local midnight
pub fn parse_price_entity(
    state: &HaEntityState,
    tz: Option<Tz>,
    now: DateTime<Utc>,
) -> Result<Vec<PricePoint>> {
    parse_entity_at(state, tz, now, 0)
}

/// Same as [`parse_price_entity`], with day arrays anchored `day_offset` days after today
fn parse_entity_at(
    state: &HaEntityState,
    tz: Option<Tz>,
    now: DateTime<Utc>,
    day_offset: i64,
) -> Result<Vec<PricePoint>> {
    let attributes = &state.attributes;

    let raw_today = attributes.get("raw_today").and_then(Value::as_array);
    let raw_tomorrow = attributes.get("raw_tomorrow").and_then(Value::as_array);
    if raw_today.is_some() || raw_tomorrow.is_some() {
        let mut points = Vec::new();
        for entry in raw_today.into_iter().chain(raw_tomorrow).flatten() {
            points.extend(parse_price_object(entry, tz));
        }
        return Ok(points);
    }

    if let Some(prices) = attributes.get("prices").and_then(Value::as_array) {
        return Ok(prices.iter().filter_map(|p| parse_price_object(p, tz)).collect());
    }

    let today_date = local_date(now, tz) + Duration::days(day_offset);
    let today = attributes.get("today").and_then(Value::as_array);
    let tomorrow = attributes.get("tomorrow").and_then(Value::as_array);
    if today.is_some() || tomorrow.is_some() {
        let mut points = Vec::new();
        if let Some(values) = today {
            points.extend(parse_day_array(values, today_date, tz)?);
        }
        if let Some(values) = tomorrow {
            points.extend(parse_day_array(values, today_date + Duration::days(1), tz)?);
        }
        return Ok(points);
    }

    let keys = attributes
        .as_object()
        .map(|obj| obj.keys().cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    anyhow::bail!(
        "Unsupported price sensor format. Available attributes: {keys:?}. \
         Expected raw_today/raw_tomorrow, prices, or today/tomorrow arrays"
    )
}

fn parse_price_object(entry: &Value, tz: Option<Tz>) -> Option<PricePoint> {
    let start = ["start", "startsAt", "time"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))?;
    let price = ["value", "price", "total"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(value_as_f32))?;
    let time = parse_timestamp(start, tz)?;

    let point = PricePoint::new(time, price);
    match entry
        .get("level")
        .and_then(Value::as_str)
        .and_then(|level| level.parse::<PriceLevel>().ok())
    {
        Some(level) => Some(point.with_level(level)),
        None => Some(point),
    }
}

fn parse_day_array(values: &[Value], date: NaiveDate, tz: Option<Tz>) -> Result<Vec<PricePoint>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }

    // 23/25-entry days happen on DST transitions; the interval follows the entry count.
    let interval_minutes = match values.len() {
        n if n >= 92 => 15,
        n if n >= 46 => 30,
        _ => 60,
    };

    let midnight = local_midnight(date, tz)
        .with_context(|| format!("Local midnight does not exist on {date}"))?;

    let mut points = Vec::with_capacity(values.len());
    let mut offset = 0;
    for value in values {
        let time = midnight + Duration::minutes(offset);
        offset += interval_minutes;
        if let Some(price) = value_as_f32(value) {
            points.push(PricePoint::new(time, price));
        }
    }
    Ok(points)
}

fn parse_timestamp(raw: &str, tz: Option<Tz>) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    match tz {
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc)),
        None => Some(naive.and_utc()),
    }
}

fn local_date(now: DateTime<Utc>, tz: Option<Tz>) -> NaiveDate {
    match tz {
        Some(tz) => now.with_timezone(&tz).date_naive(),
        None => now.date_naive(),
    }
}

fn local_midnight(date: NaiveDate, tz: Option<Tz>) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    match tz {
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc)),
        None => Some(naive.and_utc()),
    }
}

// ============= Device Gateway =============

/// Device gateway driving climate / water heater entities
pub struct HaClimateGateway {
    client: Arc<HomeAssistantClient>,
    entities: HashMap<LoadId, String>,
}

impl std::fmt::Debug for HaClimateGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaClimateGateway")
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}

impl HaClimateGateway {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self {
            client,
            entities: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, load: LoadId, entity_id: impl Into<String>) -> Self {
        self.entities.insert(load, entity_id.into());
        self
    }

    pub fn entity_for(&self, load: LoadId) -> Option<&str> {
        self.entities.get(&load).map(String::as_str)
    }

    fn require_entity(&self, load: LoadId) -> Result<&str> {
        self.entity_for(load)
            .with_context(|| format!("No entity configured for {}", load.display_name()))
    }
}

#[async_trait]
impl DeviceGateway for HaClimateGateway {
    async fn read_state(&self, load: LoadId) -> Result<LoadState> {
        let entity_id = self.require_entity(load)?;
        debug!("🌡️ [ADAPTER] Reading {} from {}", load, entity_id);

        let state = self
            .client
            .get_state(entity_id)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to read entity: {entity_id}"))?;

        let load_state = load_state_from_entity(&state)?;
        debug!(
            "✅ [ADAPTER] {}: current {:.1}°C, target {:.1}°C",
            load, load_state.current_temp, load_state.current_target
        );
        Ok(load_state)
    }

    async fn write_target(&self, load: LoadId, target: f32) -> Result<()> {
        let entity_id = self.require_entity(load)?;
        let (service, data) = target_service_call(entity_id, target)?;

        info!("🎯 [ADAPTER] Setting {} ({}) to {:.1}°C", load, entity_id, target);
        self.client
            .call_service(&service, data)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Failed to set target for {entity_id}"))
    }

    fn name(&self) -> &str {
        "HaClimate"
    }
}

/// Read `{current_temperature, temperature}` from a climate-like entity.
/// Number entities carry the setpoint in their state.
pub fn load_state_from_entity(state: &HaEntityState) -> Result<LoadState> {
    if !state.is_available() {
        anyhow::bail!("Entity {} is {}", state.entity_id, state.state);
    }

    let current_target = state
        .attribute_f32("temperature")
        .or_else(|| state.state_f32())
        .with_context(|| format!("Entity {} has no target temperature", state.entity_id))?;
    let current_temp = state
        .attribute_f32("current_temperature")
        .unwrap_or(current_target);

    Ok(LoadState {
        current_temp,
        current_target,
    })
}

/// Service name and payload that command `target` on `entity_id`
pub fn target_service_call(entity_id: &str, target: f32) -> Result<(String, Value)> {
    match entity_domain(entity_id) {
        domain @ ("climate" | "water_heater") => Ok((
            format!("{domain}.set_temperature"),
            json!({"entity_id": entity_id, "temperature": target}),
        )),
        domain @ ("number" | "input_number") => Ok((
            format!("{domain}.set_value"),
            json!({"entity_id": entity_id, "value": target}),
        )),
        domain => anyhow::bail!("Unsupported entity domain '{domain}' for {entity_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn entity(entity_id: &str, state: &str, attributes: Value) -> HaEntityState {
        HaEntityState {
            entity_id: entity_id.to_owned(),
            state: state.to_owned(),
            attributes,
            last_changed: String::new(),
            last_updated: String::new(),
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_raw_objects_with_levels() {
        let state = entity(
            "sensor.tibber_prices",
            "0.21",
            json!({
                "raw_today": [
                    {"startsAt": "2025-01-15T00:00:00+01:00", "total": 0.18, "level": "CHEAP"},
                    {"startsAt": "2025-01-15T01:00:00+01:00", "total": 0.21, "level": "NORMAL"}
                ],
                "raw_tomorrow": [
                    {"start": "2025-01-16T00:00:00+01:00", "value": "0.30", "level": "VERY_EXPENSIVE"}
                ]
            }),
        );

        let points = parse_price_entity(&state, None, ts("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].time, ts("2025-01-14T23:00:00Z"));
        assert_eq!(points[0].level, Some(PriceLevel::Cheap));
        assert!((points[2].price - 0.30).abs() < 1e-6);
        assert_eq!(points[2].level, Some(PriceLevel::VeryExpensive));
    }

    #[test]
    fn test_parse_prices_array_skips_malformed() {
        let state = entity(
            "sensor.prices",
            "ok",
            json!({
                "prices": [
                    {"time": "2025-01-15T10:00:00Z", "price": 0.1},
                    {"time": "not a time", "price": 0.2},
                    {"time": "2025-01-15T11:00:00Z"}
                ]
            }),
        );
        let points = parse_price_entity(&state, None, ts("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].level.is_none());
    }

    #[test]
    fn test_parse_hourly_arrays_anchor_to_local_midnight() {
        let today: Vec<f32> = (0..24).map(|h| h as f32 / 100.0).collect();
        let tomorrow: Vec<f32> = vec![0.5; 24];
        let state = entity(
            "sensor.nordpool",
            "0.1",
            json!({"today": today, "tomorrow": tomorrow}),
        );

        let tz: Tz = "Europe/Prague".parse().unwrap();
        let points = parse_price_entity(&state, Some(tz), ts("2025-01-15T10:00:00Z")).unwrap();

        assert_eq!(points.len(), 48);
        // Prague is UTC+1 in January
        assert_eq!(points[0].time, ts("2025-01-14T23:00:00Z"));
        assert_eq!(points[24].time, ts("2025-01-15T23:00:00Z"));
        assert!((points[5].price - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_parse_quarter_hour_array() {
        let today = vec![json!(0.1); 96];
        let state = entity("sensor.spot", "0.1", json!({"today": today}));
        let points = parse_price_entity(&state, None, ts("2025-01-15T10:00:00Z")).unwrap();

        assert_eq!(points.len(), 96);
        assert_eq!(points[1].time, ts("2025-01-15T00:15:00Z"));
        assert_eq!(points[95].time.hour(), 23);
    }

    #[test]
    fn test_null_entries_are_skipped() {
        let mut today = vec![json!(0.2); 24];
        today[3] = Value::Null;
        let state = entity("sensor.spot", "0.2", json!({"today": today, "tomorrow": []}));
        let points = parse_price_entity(&state, None, ts("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(points.len(), 23);
        assert_eq!(points[3].time, ts("2025-01-15T04:00:00Z"));
    }

    #[test]
    fn test_tomorrow_entity_offset() {
        let state = entity("sensor.spot_tomorrow", "0.2", json!({"today": vec![0.2; 24]}));
        let points = parse_entity_at(&state, None, ts("2025-01-15T10:00:00Z"), 1).unwrap();
        assert_eq!(points[0].time, ts("2025-01-16T00:00:00Z"));
    }

    #[test]
    fn test_unsupported_format() {
        let state = entity("sensor.price", "0.2", json!({"unit": "EUR/kWh"}));
        let err = parse_price_entity(&state, None, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Unsupported price sensor format"));
    }

    #[test]
    fn test_load_state_from_climate() {
        let state = entity(
            "climate.zone1",
            "heat",
            json!({"current_temperature": 20.5, "temperature": 21.0}),
        );
        let load_state = load_state_from_entity(&state).unwrap();
        assert!((load_state.current_temp - 20.5).abs() < 1e-6);
        assert!((load_state.current_target - 21.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_state_from_number_entity() {
        let state = entity("number.tank_target", "55", json!({}));
        let load_state = load_state_from_entity(&state).unwrap();
        assert!((load_state.current_target - 55.0).abs() < 1e-6);
        assert!((load_state.current_temp - 55.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_state_unavailable_is_error() {
        let state = entity("climate.zone1", "unavailable", json!({}));
        assert!(load_state_from_entity(&state).is_err());
    }

    #[test]
    fn test_target_service_call_per_domain() {
        let (service, data) = target_service_call("climate.zone1", 21.5).unwrap();
        assert_eq!(service, "climate.set_temperature");
        assert_eq!(data["temperature"], json!(21.5));

        let (service, _) = target_service_call("water_heater.tank", 55.0).unwrap();
        assert_eq!(service, "water_heater.set_temperature");

        let (service, data) = target_service_call("input_number.tank", 50.0).unwrap();
        assert_eq!(service, "input_number.set_value");
        assert_eq!(data["value"], json!(50.0));

        assert!(target_service_call("switch.heater", 20.0).is_err());
    }
}
