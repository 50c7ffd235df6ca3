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

//! ISO country → ENTSO-E bidding-zone (EIC) lookup.
//!
//! The map is a JSON object of two-letter country codes to EIC code lists,
//! e.g. `{"SE": ["10Y1001A1001A44P", ...]}`. A bundled copy covers the
//! European day-ahead markets; `load` reads a custom file.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

const BUNDLED_MAP: &str = include_str!("../data/entsoe_area_map.json");

#[derive(Debug, Clone, Default)]
pub struct EntsoeAreaMap {
    areas: BTreeMap<String, Vec<String>>,
}

impl EntsoeAreaMap {
    /// Map shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_MAP).context("Bundled ENTSO-E area map is invalid")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read area map {}", path.display()))?;
        let map = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse area map {}", path.display()))?;
        debug!(
            "🗺️ Loaded ENTSO-E area map from {} ({} countries)",
            path.display(),
            map.len()
        );
        Ok(map)
    }

    /// Parse the JSON map. Keys that are not two-letter codes and non-string
    /// codes are skipped; duplicates collapse and codes are kept sorted.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut areas: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (iso, codes) in raw {
            let Some(iso) = normalize_iso(&iso) else {
                warn!("⚠️ Skipping invalid country code in area map: '{iso}'");
                continue;
            };
            let Some(codes) = codes.as_array() else {
                warn!("⚠️ Area list for {iso} is not an array");
                continue;
            };
            let bucket = areas.entry(iso).or_default();
            for code in codes.iter().filter_map(serde_json::Value::as_str) {
                let code = code.trim();
                if !code.is_empty() && !bucket.iter().any(|c| c == code) {
                    bucket.push(code.to_owned());
                }
            }
        }
        for codes in areas.values_mut() {
            codes.sort();
        }

        Ok(Self { areas })
    }

    /// EIC codes for a country; empty when the country is unknown
    pub fn areas_for_country(&self, iso: &str) -> &[String] {
        normalize_iso(iso)
            .and_then(|iso| self.areas.get(&iso))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First country (alphabetically) listing `eic`. Shared zones such as
    /// DE-LU resolve to the first listed country.
    pub fn country_for_area(&self, eic: &str) -> Option<&str> {
        let eic = eic.trim();
        self.areas
            .iter()
            .find(|(_, codes)| codes.iter().any(|c| c.eq_ignore_ascii_case(eic)))
            .map(|(iso, _)| iso.as_str())
    }

    pub fn contains_area(&self, eic: &str) -> bool {
        self.country_for_area(eic).is_some()
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.areas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

fn normalize_iso(value: &str) -> Option<String> {
    let value = value.trim().to_uppercase();
    (value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())).then_some(value)
}
