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

//! Decision and self-calibration engine for price-aware heat-pump setpoints.
//!
//! The pure parts (`pricing`, `comfort`, `strategy`, `savings`, `calibration`)
//! perform no I/O and do not log. `cycle` is the async shell that wires them to
//! the collaborator traits in `traits`.

pub mod calibration;
pub mod comfort;
pub mod cycle;
pub mod error;
pub mod history;
pub mod persistence;
pub mod pricing;
pub mod savings;
pub mod strategy;
pub mod traits;

pub use calibration::{CalibrationOutcome, CalibrationService};
pub use comfort::{ComfortBand, ComfortProfile};
pub use cycle::{ControlLoop, CycleReport, DataSources, EngineConfig, LoadSettings};
pub use error::{CycleError, CycleKind, CycleResult};
pub use history::{DecisionHistory, MAX_HISTORY_ENTRIES};
pub use persistence::FileHistoryStore;
pub use pricing::PriceAnalysis;
pub use savings::SavingsSummary;
pub use strategy::{CycleInput, CycleOutcome, LoadInput, LoadStrategy, OptimizationEngine};
pub use traits::{DeviceGateway, HistoryStore, PriceDataSource, WeatherDataSource};
