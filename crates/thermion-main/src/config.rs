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

mod validation;

pub use validation::ValidationResult;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use thermion_adapters::EntsoeAreaMap;
use thermion_core::{EngineConfig, LoadSettings};
use thermion_types::{ComfortProfileConfig, LoadConstraints, ThermalModel};

const HA_ADDON_OPTIONS: &str = "/data/options.json";
const CONFIG_TOML: &str = "config.toml";
const CONFIG_JSON: &str = "config.json";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub homeassistant: HomeAssistantConfig,
    pub pricing: PricingConfig,
    pub weather: WeatherConfig,
    pub loads: LoadsConfig,
    pub comfort: ComfortProfileConfig,
    pub thermal: ThermalConfig,
    pub system: SystemConfig,
}

/// Home Assistant connection. Both fields fall back to `HA_BASE_URL`/`HA_TOKEN`,
/// then to the Supervisor API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price sensor (Nord Pool, Tibber, ENTSO-E, ...)
    pub price_entity: String,

    /// Separate sensor publishing tomorrow's prices
    pub tomorrow_price_entity: Option<String>,

    /// ENTSO-E bidding zone (EIC code), checked against the area map
    pub price_area: Option<String>,

    /// ISO country code the bidding zone must belong to
    pub country: Option<String>,

    /// Custom area map; the bundled one is used when unset
    pub area_map_path: Option<String>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_entity: "sensor.electricity_price".to_owned(),
            tomorrow_price_entity: None,
            price_area: None,
            country: None,
            area_map_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub entity: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            entity: "weather.home".to_owned(),
        }
    }
}

/// A controllable load and its setpoint limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub entity_id: String,
    pub min_temp: f32,
    pub max_temp: f32,
    /// Maximum setpoint change per cycle
    pub step: f32,
    /// Apply the weather bias (zones default to yes, the tank to no)
    #[serde(default)]
    pub apply_weather: Option<bool>,
}

impl LoadConfig {
    fn constraints(&self) -> LoadConstraints {
        LoadConstraints::new(self.min_temp, self.max_temp, self.step)
    }

    fn zone_settings(&self) -> LoadSettings {
        let mut settings = LoadSettings::zone(self.constraints());
        if let Some(apply) = self.apply_weather {
            settings.apply_weather = apply;
        }
        settings
    }

    fn tank_settings(&self) -> LoadSettings {
        let mut settings = LoadSettings::tank(self.constraints());
        if let Some(apply) = self.apply_weather {
            settings.apply_weather = apply;
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadsConfig {
    pub zone1: LoadConfig,
    pub zone2: Option<LoadConfig>,
    pub tank: Option<LoadConfig>,
}

impl Default for LoadsConfig {
    fn default() -> Self {
        let zone = LoadConstraints::zone_default();
        Self {
            zone1: LoadConfig {
                entity_id: "climate.zone1".to_owned(),
                min_temp: zone.min,
                max_temp: zone.max,
                step: zone.step,
                apply_weather: None,
            },
            zone2: None,
            tank: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// Responsiveness coefficient used until the first calibration
    pub k: f32,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            k: ThermalModel::DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Compute and record decisions without commanding devices (default: true for safety)
    pub dry_run: bool,

    pub decision_interval_secs: u64,

    pub calibration_interval_secs: u64,

    /// Directory for history and calibration files
    pub data_dir: String,

    /// IANA timezone; fetched from Home Assistant when unset
    pub timezone: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            decision_interval_secs: 3600,
            calibration_interval_secs: 7 * 24 * 3600,
            data_dir: thermion_core::persistence::DEFAULT_DATA_DIR.to_owned(),
            timezone: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from HA addon options or config file
    pub fn load() -> Result<Self> {
        Self::load_from(
            Path::new(HA_ADDON_OPTIONS),
            Path::new(CONFIG_TOML),
            Path::new(CONFIG_JSON),
            |key| std::env::var(key).ok(),
        )
    }

    /// First existing source wins: add-on options, TOML, JSON, then defaults
    /// with environment overrides.
    pub fn load_from(
        addon_options: &Path,
        toml_path: &Path,
        json_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config = if let Ok(options_str) = std::fs::read_to_string(addon_options) {
            let config: AppConfig =
                serde_json::from_str(&options_str).context("Failed to parse HA addon options")?;
            info!("✅ Loaded configuration from HA addon options");
            config
        } else if let Ok(config_str) = std::fs::read_to_string(toml_path) {
            let config: AppConfig = toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", toml_path.display()))?;
            info!("✅ Loaded configuration from {}", toml_path.display());
            config
        } else if let Ok(config_str) = std::fs::read_to_string(json_path) {
            let config: AppConfig = serde_json::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", json_path.display()))?;
            info!("✅ Loaded configuration from {}", json_path.display());
            config
        } else {
            warn!("No configuration file found, using defaults with environment overrides");
            Self::from_env(env)
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables (development/testing)
    fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = env("HA_BASE_URL") {
            config.homeassistant.base_url = Some(url);
        }
        if let Some(token) = env("HA_TOKEN") {
            config.homeassistant.token = Some(token);
        }
        if let Some(entity) = env("PRICE_ENTITY") {
            config.pricing.price_entity = entity;
        }
        if let Some(dry_run) = env("DRY_RUN")
            && let Ok(enabled) = dry_run.parse::<bool>()
        {
            config.system.dry_run = enabled;
        }
        if let Some(timezone) = env("TIMEZONE") {
            config.system.timezone = Some(timezone);
        }

        config
    }

    /// Timezone from the configuration, if set and valid
    pub fn configured_timezone(&self) -> Option<Tz> {
        self.system
            .timezone
            .as_deref()
            .and_then(|tz| tz.parse::<Tz>().ok())
    }

    pub fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.system.decision_interval_secs)
    }

    pub fn calibration_interval(&self) -> Duration {
        Duration::from_secs(self.system.calibration_interval_secs)
    }

    /// Validate configuration with detailed error reporting
    pub fn validate_detailed(&self) -> ValidationResult {
        let mut result = ValidationResult::success();

        if self.pricing.price_entity.trim().is_empty() {
            result.add_error("pricing.price_entity", "Price entity cannot be empty");
        }
        self.validate_price_area(&mut result);

        if self.weather.enabled && !self.weather.entity.starts_with("weather.") {
            result.add_error(
                "weather.entity",
                format!("'{}' is not a weather entity", self.weather.entity),
            );
        }

        validate_load(&mut result, "loads.zone1", &self.loads.zone1, (5.0, 30.0));
        if let Some(zone2) = &self.loads.zone2 {
            validate_load(&mut result, "loads.zone2", zone2, (5.0, 30.0));
        }
        if let Some(tank) = &self.loads.tank {
            validate_load(&mut result, "loads.tank", tank, (30.0, 75.0));
        }

        let comfort = &self.comfort;
        if comfort.day_start > 23 {
            result.add_error("comfort.day_start", "Must be an hour between 0 and 23");
        }
        if comfort.day_end > 24 {
            result.add_error("comfort.day_end", "Must be an hour between 0 and 24");
        }
        if comfort.day_start >= comfort.day_end {
            result.add_error("comfort.day_start", "Must be earlier than day_end");
        }
        if comfort.day_start < comfort.day_end
            && comfort.pre_heat_hours > comfort.night_hours()
        {
            result.add_error(
                "comfort.pre_heat_hours",
                format!(
                    "Pre-heat of {}h overlaps the evening; the night window is only {}h",
                    comfort.pre_heat_hours,
                    comfort.night_hours()
                ),
            );
        } else if comfort.pre_heat_hours > 12 {
            result.add_warning(
                "comfort.pre_heat_hours",
                format!("Pre-heat of {}h is unusually long", comfort.pre_heat_hours),
            );
        }
        if comfort.night_reduction.is_nan() || comfort.night_reduction < 0.0 {
            result.add_error("comfort.night_reduction", "Must be non-negative");
        }

        if !(ThermalModel::MIN_K..=ThermalModel::MAX_K).contains(&self.thermal.k) {
            result.add_warning(
                "thermal.k",
                format!(
                    "K={} is outside [{}, {}] and will be clamped",
                    self.thermal.k,
                    ThermalModel::MIN_K,
                    ThermalModel::MAX_K
                ),
            );
        }

        if self.system.decision_interval_secs < 60 {
            result.add_error("system.decision_interval_secs", "Must be at least 60 seconds");
        }
        if self.system.decision_interval_secs > 3600 {
            result.add_warning(
                "system.decision_interval_secs",
                format!(
                    "Value is very high ({}s), setpoints will lag price changes",
                    self.system.decision_interval_secs
                ),
            );
        }
        if self.system.calibration_interval_secs < self.system.decision_interval_secs {
            result.add_error(
                "system.calibration_interval_secs",
                "Must not be shorter than the decision interval",
            );
        }
        if self.system.data_dir.trim().is_empty() {
            result.add_error("system.data_dir", "Data directory cannot be empty");
        }
        if let Some(tz) = &self.system.timezone
            && tz.parse::<Tz>().is_err()
        {
            result.add_error("system.timezone", format!("Unknown timezone '{tz}'"));
        }

        result
    }

    fn validate_price_area(&self, result: &mut ValidationResult) {
        let Some(area) = self.pricing.price_area.as_deref() else {
            return;
        };

        let map = match &self.pricing.area_map_path {
            Some(path) => EntsoeAreaMap::load(path),
            None => EntsoeAreaMap::bundled(),
        };
        let map = match map {
            Ok(map) => map,
            Err(e) => {
                result.add_warning(
                    "pricing.area_map_path",
                    format!("Area map unavailable, price area not checked: {e:#}"),
                );
                return;
            }
        };

        if !map.contains_area(area) {
            result.add_error(
                "pricing.price_area",
                format!("'{area}' is not a known ENTSO-E bidding zone"),
            );
            return;
        }

        if let Some(country) = self.pricing.country.as_deref() {
            let areas = map.areas_for_country(country);
            if areas.is_empty() {
                result.add_warning(
                    "pricing.country",
                    format!("No bidding zones on record for '{country}'"),
                );
            } else if !areas.iter().any(|a| a.eq_ignore_ascii_case(area.trim())) {
                result.add_error(
                    "pricing.price_area",
                    format!("'{area}' is not a bidding zone of {country}"),
                );
            }
        }
    }

    /// Validate configuration, failing on the first reported errors
    pub fn validate(&self) -> Result<()> {
        let result = self.validate_detailed();
        for warning in &result.warnings {
            warn!("⚠️ Config: {}", warning);
        }
        if result.has_errors() {
            let errors: Vec<String> = result.errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("Invalid configuration: {}", errors.join("; "));
        }
        Ok(())
    }
}

fn validate_load(result: &mut ValidationResult, prefix: &str, load: &LoadConfig, sane: (f32, f32)) {
    if load.entity_id.trim().is_empty() {
        result.add_error(format!("{prefix}.entity_id"), "Entity ID cannot be empty");
    }
    if load.min_temp.is_nan() || load.max_temp.is_nan() || load.min_temp >= load.max_temp {
        result.add_error(
            format!("{prefix}.min_temp"),
            format!(
                "Must be less than max_temp ({} >= {})",
                load.min_temp, load.max_temp
            ),
        );
    }
    if load.step.is_nan() || load.step <= 0.0 {
        result.add_error(format!("{prefix}.step"), "Must be positive");
    } else if load.step > load.max_temp - load.min_temp {
        result.add_warning(
            format!("{prefix}.step"),
            "Step exceeds the whole band, setpoints are not rate limited",
        );
    }
    let (low, high) = sane;
    if load.min_temp < low || load.max_temp > high {
        result.add_warning(
            format!("{prefix}.max_temp"),
            format!(
                "Band [{}, {}] is outside the usual [{low}, {high}]",
                load.min_temp, load.max_temp
            ),
        );
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            zone1: config.loads.zone1.zone_settings(),
            zone2: config.loads.zone2.as_ref().map(LoadConfig::zone_settings),
            tank: config.loads.tank.as_ref().map(LoadConfig::tank_settings),
            comfort: config.comfort.clone(),
            thermal_k: ThermalModel::clamp_k(config.thermal.k),
            timezone: config.configured_timezone().unwrap_or(chrono_tz::UTC),
            dry_run: config.system.dry_run,
        }
    }
}
