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

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use thermion_types::{ComfortProfileConfig, LoadConstraints};

const FULL_COMFORT: f32 = 1.0;
const NIGHT_COMFORT: f32 = 0.5;

/// Forward distance from `from` to `to` on a 24h clock
fn clock_distance(from: f32, to: f32) -> f32 {
    (to - from).rem_euclid(24.0)
}

/// Half-open clock window [start, end), wrapping midnight when end < start
fn in_window(hour: f32, start: f32, end: f32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Setpoint band after the comfort squeeze
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortBand {
    pub min: f32,
    pub max: f32,
}

impl ComfortBand {
    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

/// Time-of-day comfort weighting
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortProfile {
    config: ComfortProfileConfig,
}

impl ComfortProfile {
    pub fn new(config: ComfortProfileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComfortProfileConfig {
        &self.config
    }

    /// Comfort factor in [0.5, 1.0] for a fractional local clock hour.
    ///
    /// Full comfort from `day_start` until one hour before `day_end`, a one
    /// hour ramp down to the night level, and a `pre_heat_hours` ramp back up
    /// ending at `day_start`. The morning ramp is limited to the night window.
    pub fn comfort_factor(&self, hour: f32) -> f32 {
        let hour = hour.rem_euclid(24.0);
        let day_start = (self.config.day_start % 24) as f32;
        let day_end = (self.config.day_end % 24) as f32;
        let evening = (day_end - 1.0).rem_euclid(24.0);
        let pre_heat = self.config.effective_pre_heat_hours() as f32;
        let wake = (day_start - pre_heat).rem_euclid(24.0);

        if in_window(hour, day_start, evening) {
            FULL_COMFORT
        } else if in_window(hour, evening, day_end) {
            FULL_COMFORT - (FULL_COMFORT - NIGHT_COMFORT) * clock_distance(evening, hour)
        } else if pre_heat > 0.0 && in_window(hour, wake, day_start) {
            NIGHT_COMFORT + (FULL_COMFORT - NIGHT_COMFORT) * clock_distance(wake, hour) / pre_heat
        } else {
            NIGHT_COMFORT
        }
    }

    /// Comfort factor at an instant, evaluated on the local clock
    pub fn factor_at(&self, time: DateTime<Utc>, timezone: Tz) -> f32 {
        self.comfort_factor(local_hour(time, timezone))
    }

    /// Hours from `hour` until the next `day_start` (0 exactly at day start)
    pub fn hours_until_day_start(&self, hour: f32) -> f32 {
        clock_distance(hour.rem_euclid(24.0), (self.config.day_start % 24) as f32)
    }

    /// Narrow the load's band by the night reduction scaled with (1 - factor).
    /// A band squeezed past itself collapses to its midpoint.
    pub fn adjusted_band(&self, constraints: &LoadConstraints, factor: f32) -> ComfortBand {
        let squeeze =
            (1.0 - factor.clamp(NIGHT_COMFORT, FULL_COMFORT)) * self.config.night_reduction;
        let min = constraints.min + squeeze;
        let max = constraints.max - squeeze;
        if min > max {
            let mid = constraints.midpoint();
            ComfortBand { min: mid, max: mid }
        } else {
            ComfortBand { min, max }
        }
    }
}

impl Default for ComfortProfile {
    fn default() -> Self {
        Self::new(ComfortProfileConfig::default())
    }
}

/// Fractional hour on the local clock
pub fn local_hour(time: DateTime<Utc>, timezone: Tz) -> f32 {
    let local = time.with_timezone(&timezone);
    local.hour() as f32 + local.minute() as f32 / 60.0 + local.second() as f32 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_default_profile_windows() {
        let profile = ComfortProfile::default();
        // day 6..21 full, 21..22 ramp down, 22..4 night, 4..6 ramp up
        assert!(approx(profile.comfort_factor(12.0), 1.0));
        assert!(approx(profile.comfort_factor(6.0), 1.0));
        assert!(approx(profile.comfort_factor(21.0), 1.0));
        assert!(approx(profile.comfort_factor(21.5), 0.75));
        assert!(approx(profile.comfort_factor(22.0), 0.5));
        assert!(approx(profile.comfort_factor(2.0), 0.5));
        assert!(approx(profile.comfort_factor(4.0), 0.5));
        assert!(approx(profile.comfort_factor(5.0), 0.75));
    }

    #[test]
    fn test_factor_bounded_and_continuous() {
        let profile = ComfortProfile::default();
        let mut previous = profile.comfort_factor(0.0);
        for step in 1..=2400 {
            let hour = step as f32 / 100.0;
            let factor = profile.comfort_factor(hour);
            assert!((0.5..=1.0).contains(&factor), "hour {hour}: {factor}");
            assert!((factor - previous).abs() <= 0.01, "jump at hour {hour}");
            previous = factor;
        }
    }

    #[test]
    fn test_windows_wrap_midnight() {
        let profile = ComfortProfile::new(ComfortProfileConfig {
            day_start: 1,
            day_end: 22,
            pre_heat_hours: 3,
            night_reduction: 2.0,
        });
        // evening ramp 21..22, wake ramp 22..1 across midnight
        assert!(approx(profile.comfort_factor(21.5), 0.75));
        assert!(approx(profile.comfort_factor(22.0), 0.5));
        assert!(approx(profile.comfort_factor(0.0), 0.5 + 0.5 * 2.0 / 3.0));
        assert!(approx(profile.comfort_factor(1.0), 1.0));
    }

    #[test]
    fn test_long_pre_heat_is_limited_to_night() {
        let profile = ComfortProfile::new(ComfortProfileConfig {
            day_start: 6,
            day_end: 22,
            pre_heat_hours: 10,
            night_reduction: 2.0,
        });
        assert!(approx(profile.comfort_factor(21.99), 0.505));
        assert!(approx(profile.comfort_factor(22.0), 0.5));
        assert!(approx(profile.comfort_factor(2.0), 0.75));

        let mut previous = profile.comfort_factor(0.0);
        for step in 1..=2400 {
            let hour = step as f32 / 100.0;
            let factor = profile.comfort_factor(hour);
            assert!((factor - previous).abs() <= 0.01, "jump at hour {hour}");
            previous = factor;
        }
    }

    #[test]
    fn test_zero_pre_heat_has_no_ramp() {
        let profile = ComfortProfile::new(ComfortProfileConfig {
            pre_heat_hours: 0,
            ..Default::default()
        });
        assert!(approx(profile.comfort_factor(5.9), 0.5));
        assert!(approx(profile.comfort_factor(6.0), 1.0));
    }

    #[test]
    fn test_adjusted_band() {
        let profile = ComfortProfile::default();
        let constraints = LoadConstraints::zone_default();

        let day = profile.adjusted_band(&constraints, 1.0);
        assert!(approx(day.min, 18.0) && approx(day.max, 22.0));

        let night = profile.adjusted_band(&constraints, 0.5);
        assert!(approx(night.min, 19.0) && approx(night.max, 21.0));
        assert!(approx(night.midpoint(), constraints.midpoint()));
    }

    #[test]
    fn test_adjusted_band_collapses_when_crossed() {
        let profile = ComfortProfile::new(ComfortProfileConfig {
            night_reduction: 5.0,
            ..Default::default()
        });
        let band = profile.adjusted_band(&LoadConstraints::zone_default(), 0.5);
        assert!(approx(band.min, 20.0));
        assert!(approx(band.max, 20.0));
    }

    #[test]
    fn test_hours_until_day_start() {
        let profile = ComfortProfile::default();
        assert!(approx(profile.hours_until_day_start(5.0), 1.0));
        assert!(approx(profile.hours_until_day_start(6.0), 0.0));
        assert!(approx(profile.hours_until_day_start(23.0), 7.0));
    }

    #[test]
    fn test_factor_at_uses_local_clock() {
        let profile = ComfortProfile::default();
        // 04:00 UTC is 05:00 in Prague during winter
        let time = Utc.with_ymd_and_hms(2025, 1, 10, 4, 0, 0).unwrap();
        assert!(approx(profile.factor_at(time, chrono_tz::Europe::Prague), 0.75));
        assert!(approx(profile.factor_at(time, chrono_tz::UTC), 0.5));
    }
}
