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

mod config;
mod version;

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use thermion_adapters::{HaClimateGateway, HaPriceAdapter, HaWeatherAdapter, HomeAssistantClient};
use thermion_core::{
    ControlLoop, DataSources, EngineConfig, FileHistoryStore, PriceDataSource,
    WeatherDataSource,
};
use thermion_types::LoadId;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if let Some(arg) = args.get(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("ThermION - Price-aware heat pump setpoint control");
                println!("Version: {}", version::VERSION);
                println!();
                println!("Usage: thermion [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", version::VERSION);
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {other}");
                eprintln!("Use --help for usage information.");
                std::process::exit(2);
            }
        }
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default tracing subscriber failed")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run())
}

async fn run() -> Result<()> {
    let config = AppConfig::load()?;

    info!("🚀 Starting ThermION {}", version::VERSION);
    info!("📋 Configuration Summary:");
    info!("   Price entity: {}", config.pricing.price_entity);
    if let Some(tomorrow) = &config.pricing.tomorrow_price_entity {
        info!("   Tomorrow price entity: {}", tomorrow);
    }
    info!(
        "   Zone 1: {} [{:.1}-{:.1}°C, step {:.1}]",
        config.loads.zone1.entity_id,
        config.loads.zone1.min_temp,
        config.loads.zone1.max_temp,
        config.loads.zone1.step
    );
    if let Some(zone2) = &config.loads.zone2 {
        info!(
            "   Zone 2: {} [{:.1}-{:.1}°C, step {:.1}]",
            zone2.entity_id, zone2.min_temp, zone2.max_temp, zone2.step
        );
    }
    if let Some(tank) = &config.loads.tank {
        info!(
            "   Tank: {} [{:.1}-{:.1}°C, step {:.1}]",
            tank.entity_id, tank.min_temp, tank.max_temp, tank.step
        );
    }
    info!(
        "   Comfort: day {}:00-{}:00, pre-heat {}h",
        config.comfort.day_start, config.comfort.day_end, config.comfort.pre_heat_hours
    );
    info!(
        "   Intervals: decision {}s, calibration {}s",
        config.system.decision_interval_secs, config.system.calibration_interval_secs
    );
    if config.system.dry_run {
        info!("   🧪 Dry run: decisions are recorded but not applied");
    } else {
        warn!("   ⚡ Live mode: device targets will be written");
    }

    info!("🏠 Initializing HA client...");
    let ha_client = Arc::new(HomeAssistantClient::from_config(
        config.homeassistant.base_url.clone(),
        config.homeassistant.token.clone(),
    )?);

    let timezone = resolve_timezone(&config, &ha_client).await;

    let price_adapter = match &config.pricing.tomorrow_price_entity {
        Some(tomorrow) => HaPriceAdapter::with_tomorrow_sensor(
            Arc::clone(&ha_client),
            config.pricing.price_entity.clone(),
            tomorrow.clone(),
        ),
        None => HaPriceAdapter::new(Arc::clone(&ha_client), config.pricing.price_entity.clone()),
    };
    price_adapter.set_timezone(Some(timezone));
    let prices: Arc<dyn PriceDataSource> = Arc::new(price_adapter);

    match prices.health_check().await {
        Ok(true) => info!("💰 Price data source: {}", prices.name()),
        Ok(false) => warn!("⚠️ Price entity {} is unavailable", config.pricing.price_entity),
        Err(e) => warn!("⚠️ Price source health check failed: {e:#}"),
    }

    let mut gateway = HaClimateGateway::new(Arc::clone(&ha_client))
        .with_entity(LoadId::Zone1, config.loads.zone1.entity_id.clone());
    if let Some(zone2) = &config.loads.zone2 {
        gateway = gateway.with_entity(LoadId::Zone2, zone2.entity_id.clone());
    }
    if let Some(tank) = &config.loads.tank {
        gateway = gateway.with_entity(LoadId::Tank, tank.entity_id.clone());
    }

    let weather: Option<Arc<dyn WeatherDataSource>> = if config.weather.enabled {
        info!("🌦️ Weather adjustment from {}", config.weather.entity);
        Some(Arc::new(HaWeatherAdapter::new(
            Arc::clone(&ha_client),
            config.weather.entity.clone(),
        )))
    } else {
        None
    };

    let store = Arc::new(FileHistoryStore::new(&config.system.data_dir));
    info!("💾 History stored in {}", config.system.data_dir);

    let sources = DataSources {
        prices,
        weather,
        devices: Arc::new(gateway),
        store,
    };

    let mut engine_config = EngineConfig::from(&config);
    engine_config.timezone = timezone;

    let control = ControlLoop::restore(engine_config, sources)
        .await
        .context("Failed to restore persisted state")?;

    info!("✅ Starting main loop...");
    schedule(&control, &config).await;

    info!("👋 ThermION stopped");
    Ok(())
}

/// Config timezone, else Home Assistant's, else UTC
async fn resolve_timezone(config: &AppConfig, client: &HomeAssistantClient) -> Tz {
    if let Some(tz) = config.configured_timezone() {
        info!("🌍 Using configured timezone: {}", tz.name());
        return tz;
    }

    match client.get_timezone().await {
        Ok(name) => match name.parse::<Tz>() {
            Ok(tz) => {
                info!("🌍 Using Home Assistant timezone: {}", tz.name());
                tz
            }
            Err(_) => {
                warn!("⚠️ Unknown Home Assistant timezone '{name}', using UTC");
                chrono_tz::UTC
            }
        },
        Err(e) => {
            warn!("⚠️ Failed to fetch timezone from HA ({e}), using UTC");
            chrono_tz::UTC
        }
    }
}

/// Hourly decisions and weekly calibration until Ctrl-C
async fn schedule(control: &ControlLoop, config: &AppConfig) {
    let mut decision_tick = tokio::time::interval(config.decision_interval());
    decision_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let calibration_period = config.calibration_interval();
    let mut calibration_tick =
        tokio::time::interval_at(Instant::now() + calibration_period, calibration_period);
    calibration_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = decision_tick.tick() => run_decision(control).await,
            _ = calibration_tick.tick() => run_calibration(control).await,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("❌ Failed to listen for Ctrl-C: {e}");
                }
                info!("🛑 Shutdown requested");
                break;
            }
        }
    }
}

async fn run_decision(control: &ControlLoop) {
    match control.run_decision_cycle(Utc::now()).await {
        Ok(report) => {
            let applied = report.decisions.iter().filter(|d| d.applied && d.is_change()).count();
            info!(
                "💡 [CYCLE] {} decisions ({} applied{}), history {} entries. {}",
                report.decisions.len(),
                applied,
                if report.dry_run { ", dry run" } else { "" },
                report.history_len,
                report.forecast.recommendation
            );
        }
        Err(e) => warn!("⚠️ [CYCLE] Decision cycle skipped: {e}"),
    }
}

async fn run_calibration(control: &ControlLoop) {
    match control.run_calibration_cycle(Utc::now()).await {
        Ok(outcome) => {
            let k = control.thermal_model().await.k();
            debug!("📈 [CALIBRATION] success={}, K now {:.3}", outcome.success(), k);
        }
        Err(e) => warn!("⚠️ [CALIBRATION] Calibration skipped: {e}"),
    }
}
