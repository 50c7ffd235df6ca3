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

//! JSON file persistence for cycle history and calibration results.

use crate::history::MAX_HISTORY_ENTRIES;
use crate::traits::HistoryStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thermion_types::{CalibrationResult, HistoricalEntry};
use tracing::{debug, info};

/// Default data directory. Relative so it works both in development and in the HA add-on.
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const HISTORY_FILE: &str = "history.json";
pub const CALIBRATION_FILE: &str = "calibration.json";

/// One year of weekly calibrations
pub const MAX_CALIBRATION_RECORDS: usize = 52;

/// History and calibration log stored as pretty JSON files in one directory
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    data_dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn default_production() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.data_dir.join(CALIBRATION_FILE)
    }

    /// Load history, keeping the newest entries up to capacity
    pub fn load_entries(&self) -> Result<Vec<HistoricalEntry>> {
        let mut entries: Vec<HistoricalEntry> =
            read_json(&self.history_path())?.unwrap_or_default();
        if entries.len() > MAX_HISTORY_ENTRIES {
            let excess = entries.len() - MAX_HISTORY_ENTRIES;
            entries.drain(..excess);
            debug!("Dropped {} history entries over capacity on load", excess);
        }
        Ok(entries)
    }

    pub fn save_entries(&self, entries: &[HistoricalEntry]) -> Result<()> {
        write_json_atomic(&self.history_path(), entries)
    }

    /// Calibration log, oldest first
    pub fn load_calibrations(&self) -> Result<Vec<CalibrationResult>> {
        Ok(read_json(&self.calibration_path())?.unwrap_or_default())
    }

    pub fn append_calibration(&self, result: &CalibrationResult) -> Result<()> {
        let mut log = self.load_calibrations()?;
        log.push(result.clone());
        if log.len() > MAX_CALIBRATION_RECORDS {
            let excess = log.len() - MAX_CALIBRATION_RECORDS;
            log.drain(..excess);
        }
        write_json_atomic(&self.calibration_path(), &log)
    }
}

/// Read and parse a JSON file. `Ok(None)` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        info!("{} not found, starting empty", path.display());
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Write JSON via temp file + rename so readers never see a partial file
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &json)
        .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    debug!("Saved {}", path.display());
    Ok(())
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self) -> Result<Vec<HistoricalEntry>> {
        self.load_entries()
    }

    async fn save(&self, entries: &[HistoricalEntry]) -> Result<()> {
        self.save_entries(entries)
    }

    async fn record_calibration(&self, result: &CalibrationResult) -> Result<()> {
        self.append_calibration(result)
    }

    async fn latest_calibration(&self) -> Result<Option<CalibrationResult>> {
        Ok(self.load_calibrations()?.pop())
    }
}
