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

use chrono::{DurationRound, TimeDelta, Utc};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use thermion_adapters::{HaClimateGateway, HaPriceAdapter, HaWeatherAdapter, HomeAssistantClient};
use thermion_core::{DeviceGateway, PriceDataSource, WeatherDataSource};
use thermion_types::{LoadId, PriceLevel, WeatherQuery};

fn client(server: &Server) -> Arc<HomeAssistantClient> {
    Arc::new(
        HomeAssistantClient::new(server.url(), "test_token")
            .unwrap()
            .with_retry_config(1, Duration::from_millis(1)),
    )
}

fn state_body(entity_id: &str, state: &str, attributes: serde_json::Value) -> String {
    json!({
        "entity_id": entity_id,
        "state": state,
        "attributes": attributes,
        "last_changed": "2025-10-02T10:00:00Z",
        "last_updated": "2025-10-02T10:00:00Z"
    })
    .to_string()
}

#[tokio::test]
async fn test_price_adapter_reads_sorted_series() {
    let mut server = Server::new_async().await;
    let hour = Utc::now().duration_trunc(TimeDelta::hours(1)).unwrap();
    let raw: Vec<_> = [2_i64, 0, 1]
        .iter()
        .map(|h| {
            json!({
                "start": (hour + TimeDelta::hours(*h)).to_rfc3339(),
                "value": 0.1 * (*h + 1) as f64,
                "level": if *h == 0 { "cheap" } else { "normal" }
            })
        })
        .collect();

    let mock = server
        .mock("GET", "/api/states/sensor.electricity_price")
        .match_header("authorization", "Bearer test_token")
        .with_status(200)
        .with_body(state_body(
            "sensor.electricity_price",
            "0.1",
            json!({"raw_today": raw}),
        ))
        .create_async()
        .await;

    let adapter = HaPriceAdapter::new(client(&server), "sensor.electricity_price");
    let prices = adapter.read_prices().await.unwrap();

    assert_eq!(prices.len(), 3);
    assert_eq!(prices[0].time, hour);
    assert_eq!(prices[0].level, Some(PriceLevel::Cheap));
    assert!(prices.windows(2).all(|w| w[0].time < w[1].time));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_price_adapter_survives_missing_tomorrow_entity() {
    let mut server = Server::new_async().await;
    let today = server
        .mock("GET", "/api/states/sensor.spot_today")
        .with_status(200)
        .with_body(state_body("sensor.spot_today", "0.2", json!({"today": vec![0.2; 24]})))
        .create_async()
        .await;
    let tomorrow = server
        .mock("GET", "/api/states/sensor.spot_tomorrow")
        .with_status(404)
        .create_async()
        .await;

    let adapter = HaPriceAdapter::with_tomorrow_sensor(
        client(&server),
        "sensor.spot_today",
        "sensor.spot_tomorrow",
    );
    adapter.set_timezone(Some(chrono_tz::Europe::Prague));
    let prices = adapter.read_prices().await.unwrap();

    assert_eq!(prices.len(), 24);
    today.assert_async().await;
    tomorrow.assert_async().await;
}

#[tokio::test]
async fn test_price_adapter_entity_error_propagates() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/states/sensor.missing")
        .with_status(404)
        .create_async()
        .await;

    let adapter = HaPriceAdapter::new(client(&server), "sensor.missing");
    let err = adapter.read_prices().await.unwrap_err();
    assert!(format!("{err:#}").contains("sensor.missing"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_climate_gateway_read_and_write() {
    let mut server = Server::new_async().await;
    let read = server
        .mock("GET", "/api/states/climate.ground_floor")
        .with_status(200)
        .with_body(state_body(
            "climate.ground_floor",
            "heat",
            json!({"current_temperature": 20.4, "temperature": 21.0}),
        ))
        .create_async()
        .await;
    let write = server
        .mock("POST", "/api/services/water_heater/set_temperature")
        .match_body(Matcher::Json(json!({
            "entity_id": "water_heater.tank",
            "temperature": 55.0
        })))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let gateway = HaClimateGateway::new(client(&server))
        .with_entity(LoadId::Zone1, "climate.ground_floor")
        .with_entity(LoadId::Tank, "water_heater.tank");

    let state = gateway.read_state(LoadId::Zone1).await.unwrap();
    assert!((state.current_temp - 20.4).abs() < 1e-4);
    assert!((state.current_target - 21.0).abs() < 1e-4);

    gateway.write_target(LoadId::Tank, 55.0).await.unwrap();

    read.assert_async().await;
    write.assert_async().await;
}

#[tokio::test]
async fn test_climate_gateway_unconfigured_load() {
    let server = Server::new_async().await;
    let gateway = HaClimateGateway::new(client(&server));
    assert!(gateway.read_state(LoadId::Zone2).await.is_err());
    assert!(gateway.write_target(LoadId::Zone2, 20.0).await.is_err());
}

#[tokio::test]
async fn test_weather_adapter_uses_forecast_service() {
    let mut server = Server::new_async().await;
    let now = Utc::now();

    let state = server
        .mock("GET", "/api/states/weather.home")
        .with_status(200)
        .with_body(state_body("weather.home", "cloudy", json!({"temperature": 4.0})))
        .create_async()
        .await;
    let forecast = server
        .mock("POST", "/api/services/weather/get_forecasts")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "changed_states": [],
                "service_response": {
                    "weather.home": {
                        "forecast": [
                            {"datetime": (now + TimeDelta::hours(2)).to_rfc3339(), "temperature": 1.0},
                            {"datetime": (now + TimeDelta::hours(4)).to_rfc3339(), "temperature": -2.0}
                        ]
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = HaWeatherAdapter::new(client(&server), "weather.home");
    let query = WeatherQuery {
        current_temp: 20.5,
        target_temp: 21.0,
        current_price: 0.1,
        avg_price: 0.2,
        now,
    };
    let adjustment = adapter.adjustment(&query).await.unwrap();

    assert!((adjustment.adjustment_degrees - 0.5).abs() < 1e-6);
    assert_eq!(adjustment.outdoor_temp, Some(4.0));
    state.assert_async().await;
    forecast.assert_async().await;
}

#[tokio::test]
async fn test_weather_adapter_without_forecast_still_adjusts() {
    let mut server = Server::new_async().await;
    let state = server
        .mock("GET", "/api/states/weather.home")
        .with_status(200)
        .with_body(state_body("weather.home", "snowy", json!({"temperature": -7.0})))
        .create_async()
        .await;
    let forecast = server
        .mock("POST", "/api/services/weather/get_forecasts")
        .match_query(Matcher::Any)
        .with_status(400)
        .create_async()
        .await;

    let adapter = HaWeatherAdapter::new(client(&server), "weather.home");
    let query = WeatherQuery {
        current_temp: 20.0,
        target_temp: 21.0,
        current_price: 0.3,
        avg_price: 0.2,
        now: Utc::now(),
    };
    let adjustment = adapter.adjustment(&query).await.unwrap();

    assert!((adjustment.adjustment_degrees - 1.0).abs() < 1e-6);
    state.assert_async().await;
    forecast.assert_async().await;
}
