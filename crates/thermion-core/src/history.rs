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

use std::collections::VecDeque;
use thermion_types::HistoricalEntry;

/// One week of hourly cycles
pub const MAX_HISTORY_ENTRIES: usize = 168;

/// Bounded, time-ordered record of completed cycles (oldest first).
///
/// Overflow evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct DecisionHistory {
    entries: VecDeque<HistoricalEntry>,
    max_entries: usize,
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::new(MAX_HISTORY_ENTRIES)
    }
}

impl DecisionHistory {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Build from persisted entries, keeping the newest `MAX_HISTORY_ENTRIES`
    pub fn from_entries(entries: Vec<HistoricalEntry>) -> Self {
        let mut history = Self::default();
        for entry in entries {
            history.push(entry);
        }
        history
    }

    /// Append an entry, returning the evicted oldest one on overflow
    pub fn push(&mut self, entry: HistoricalEntry) -> Option<HistoricalEntry> {
        self.entries.push_back(entry);
        if self.entries.len() > self.max_entries {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoricalEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoricalEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Check if we have enough entries for an analysis needing `required` samples
    pub fn has_sufficient_data(&self, required: usize) -> bool {
        self.entries.len() >= required
    }

    /// Snapshot for persistence (oldest first)
    pub fn to_vec(&self) -> Vec<HistoricalEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(hour: i64) -> HistoricalEntry {
        HistoricalEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            decisions: Vec::new(),
            price_now: 0.1,
            indoor_temp: 20.0,
            outdoor_temp: None,
            savings: 0.0,
            comfort: 0.0,
            weather: None,
        }
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut history = DecisionHistory::default();
        for hour in 0..MAX_HISTORY_ENTRIES as i64 {
            assert!(history.push(entry(hour)).is_none());
        }
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);

        let evicted = history.push(entry(1000)).unwrap();
        assert_eq!(evicted.timestamp, entry(0).timestamp);
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(history.iter().next().unwrap().timestamp, entry(1).timestamp);
        assert_eq!(history.latest().unwrap().timestamp, entry(1000).timestamp);
    }

    #[test]
    fn test_from_entries_keeps_newest() {
        let entries: Vec<HistoricalEntry> = (0..200).map(entry).collect();
        let history = DecisionHistory::from_entries(entries);
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(history.iter().next().unwrap().timestamp, entry(32).timestamp);
    }

    #[test]
    fn test_sufficient_data() {
        let mut history = DecisionHistory::new(10);
        assert!(history.is_empty());
        for hour in 0..3 {
            history.push(entry(hour));
        }
        assert!(history.has_sufficient_data(3));
        assert!(!history.has_sufficient_data(4));
    }
}
