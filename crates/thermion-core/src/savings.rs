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

//! Monetary and comfort scoring of setpoint decisions.

use crate::history::DecisionHistory;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thermion_types::OptimizationDecision;

/// Fraction of heating energy saved per °C of setback
pub const SAVINGS_PER_DEGREE: f32 = 0.05;

/// Assumed heat-pump draw (kWh per hour)
pub const BASELINE_KWH_PER_HOUR: f32 = 1.0;

/// Reference comfort temperature (°C)
pub const COMFORT_REFERENCE_TEMP: f32 = 21.0;

/// Estimated saving of one decision. Negative when the setpoint went up.
pub fn per_decision_savings(from_temp: f32, to_temp: f32, price: f32) -> f32 {
    (from_temp - to_temp) * SAVINGS_PER_DEGREE * BASELINE_KWH_PER_HOUR * price
}

/// Positive when the new setpoint is closer to the reference temperature
pub fn comfort_impact(from_temp: f32, to_temp: f32) -> f32 {
    (from_temp - COMFORT_REFERENCE_TEMP).abs() - (to_temp - COMFORT_REFERENCE_TEMP).abs()
}

/// Project today's total savings on the local clock.
///
/// Sums recorded savings for the elapsed hours of the current local day, adds
/// the current hour and extrapolates the remaining hours at the current rate.
pub fn project_daily_savings(
    hourly_savings: f32,
    history: &DecisionHistory,
    now: DateTime<Utc>,
    timezone: Tz,
) -> f32 {
    let local_now = now.with_timezone(&timezone);
    let today = local_now.date_naive();
    let current_hour = local_now.hour();

    let mut elapsed = 0.0;
    let mut found = false;
    for entry in history.iter() {
        let local = entry.timestamp.with_timezone(&timezone);
        if local.date_naive() == today && local.hour() < current_hour {
            elapsed += entry.savings;
            found = true;
        }
    }

    if !found {
        return hourly_savings * 24.0;
    }

    let remaining_hours = 23u32.saturating_sub(current_hour) as f32;
    elapsed + hourly_savings + hourly_savings * remaining_hours
}

/// Per-cycle savings and comfort totals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsSummary {
    /// Sum of per-decision savings for this hour
    pub hourly_savings: f32,

    /// Sum of comfort impact over heating zones
    pub comfort_impact: f32,

    /// Projected total for the current local day
    pub projected_daily: f32,
}

impl SavingsSummary {
    pub fn estimate(
        decisions: &[OptimizationDecision],
        price: f32,
        history: &DecisionHistory,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> Self {
        let hourly_savings = decisions
            .iter()
            .map(|d| per_decision_savings(d.from_temp, d.to_temp, price))
            .sum();
        let comfort = decisions
            .iter()
            .filter(|d| d.load.is_zone())
            .map(|d| comfort_impact(d.from_temp, d.to_temp))
            .sum();

        Self {
            hourly_savings,
            comfort_impact: comfort,
            projected_daily: project_daily_savings(hourly_savings, history, now, timezone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use thermion_types::{HistoricalEntry, LoadId};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn entry_at(timestamp: DateTime<Utc>, savings: f32) -> HistoricalEntry {
        HistoricalEntry {
            timestamp,
            decisions: Vec::new(),
            price_now: 0.1,
            indoor_temp: 20.0,
            outdoor_temp: None,
            savings,
            comfort: 0.0,
            weather: None,
        }
    }

    #[test]
    fn test_per_decision_savings_sign() {
        assert!(approx(per_decision_savings(21.0, 20.0, 0.2), 0.01));
        assert!(approx(per_decision_savings(20.0, 21.0, 0.2), -0.01));
        assert!(approx(per_decision_savings(20.0, 20.0, 0.2), 0.0));
    }

    #[test]
    fn test_comfort_impact() {
        assert!(approx(comfort_impact(19.0, 20.0), 1.0));
        assert!(approx(comfort_impact(21.0, 22.0), -1.0));
        assert!(approx(comfort_impact(23.0, 19.0), 0.0));
    }

    #[test]
    fn test_projection_without_same_day_history() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let mut history = DecisionHistory::default();
        history.push(entry_at(now - Duration::days(1), 5.0));
        assert!(approx(
            project_daily_savings(0.1, &history, now, chrono_tz::UTC),
            2.4
        ));
    }

    #[test]
    fn test_projection_with_elapsed_hours() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 10, 30, 0).unwrap();
        let mut history = DecisionHistory::default();
        history.push(entry_at(now - Duration::hours(2), 0.2));
        history.push(entry_at(now - Duration::hours(1), 0.3));
        // current hour entry is not counted as elapsed
        history.push(entry_at(now - Duration::minutes(10), 9.0));

        // 0.5 elapsed + 0.1 now + 13 remaining hours * 0.1
        let projected = project_daily_savings(0.1, &history, now, chrono_tz::UTC);
        assert!(approx(projected, 0.5 + 0.1 + 1.3));
    }

    #[test]
    fn test_projection_uses_local_day() {
        // 23:30 UTC on the 9th is 00:30 on the 10th in Prague
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 1, 30, 0).unwrap();
        let mut history = DecisionHistory::default();
        history.push(entry_at(
            Utc.with_ymd_and_hms(2025, 1, 9, 23, 30, 0).unwrap(),
            1.0,
        ));

        let prague = project_daily_savings(0.1, &history, now, chrono_tz::Europe::Prague);
        // local hour 2: 1.0 elapsed + 0.1 + 21 * 0.1
        assert!(approx(prague, 1.0 + 0.1 + 2.1));

        let utc = project_daily_savings(0.1, &history, now, chrono_tz::UTC);
        assert!(approx(utc, 2.4));
    }

    #[test]
    fn test_summary_scores_zones_only_for_comfort() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let decisions = vec![
            OptimizationDecision::new(LoadId::Zone1, 20.0, 21.0, "low price", now),
            OptimizationDecision::new(LoadId::Tank, 50.0, 55.0, "low price", now),
        ];
        let history = DecisionHistory::default();
        let summary = SavingsSummary::estimate(&decisions, 0.2, &history, now, chrono_tz::UTC);

        assert!(approx(summary.hourly_savings, -0.01 - 0.05));
        assert!(approx(summary.comfort_impact, 1.0));
        assert!(approx(summary.projected_daily, summary.hourly_savings * 24.0));
    }
}
