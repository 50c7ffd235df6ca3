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

//! Price series analytics: statistics, local extrema and trend detection,
//! and the forward-looking forecast consumed by the optimizer.

mod forecast;

pub use forecast::{
    LOOKAHEAD_POINTS, SIGNIFICANT_CHANGE_PERCENT, build_forecast, current_price_point,
};

use chrono::{DateTime, Utc};
use thermion_types::{
    PriceExtremum, PriceForecast, PricePattern, PricePoint, PricePosition, PriceSeriesStats,
    PriceTrend, TrendDirection,
};

/// Deltas smaller than this are treated as flat
const FLAT_EPSILON: f32 = 1e-6;

/// Sort by time and collapse points sharing a timestamp (last one wins)
pub fn normalize_series(prices: &[PricePoint]) -> Vec<PricePoint> {
    let mut sorted: Vec<PricePoint> = prices.to_vec();
    // Stable sort keeps input order among duplicates
    sorted.sort_by_key(|p| p.time);

    let mut normalized: Vec<PricePoint> = Vec::with_capacity(sorted.len());
    for point in sorted {
        match normalized.last_mut() {
            Some(last) if last.time == point.time => *last = point,
            _ => normalized.push(point),
        }
    }
    normalized
}

/// Summary statistics over every price in the series
pub fn compute_statistics(prices: &[PricePoint]) -> PriceSeriesStats {
    let values: Vec<f32> = prices.iter().map(|p| p.price).collect();
    statistics_of(&values)
}

/// Statistics over raw values. Non-finite values are ignored.
pub fn statistics_of(values: &[f32]) -> PriceSeriesStats {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return PriceSeriesStats::default();
    }
    sorted.sort_by(f32::total_cmp);

    let n = sorted.len();
    let count = n as f32;
    let avg = sorted.iter().sum::<f32>() / count;

    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let variance = sorted.iter().map(|v| (v - avg).powi(2)).sum::<f32>() / count;
    let std_dev = variance.sqrt();

    // Nearest-rank percentiles
    let p25 = sorted[n / 4];
    let p75 = sorted[(n * 3) / 4];

    let volatility = if avg.abs() > f32::EPSILON {
        std_dev / avg
    } else {
        0.0
    };

    PriceSeriesStats {
        min: sorted[0],
        max: sorted[n - 1],
        avg,
        median,
        std_dev,
        p25,
        p75,
        volatility,
    }
}

/// Position of `current` inside [min, max], 0.5 when the range is degenerate
pub fn normalized_price(current: f32, min: f32, max: f32) -> f32 {
    if max > min {
        ((current - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn delta_direction(delta: f32) -> Option<TrendDirection> {
    if delta > FLAT_EPSILON {
        Some(TrendDirection::Up)
    } else if delta < -FLAT_EPSILON {
        Some(TrendDirection::Down)
    } else {
        None
    }
}

fn make_trend(
    series: &[PricePoint],
    direction: TrendDirection,
    start: usize,
    end: usize,
) -> PriceTrend {
    let start_price = series[start].price;
    let end_price = series[end].price;
    let change_percent = if start_price.abs() > f32::EPSILON {
        (end_price - start_price) / start_price * 100.0
    } else {
        0.0
    };

    PriceTrend {
        direction,
        start_index: start,
        end_index: end,
        start_time: series[start].time,
        end_time: series[end].time,
        start_price,
        end_price,
        change_percent,
    }
}

/// Detect strict interior extrema and directional runs.
///
/// Expects a time-ordered series (see [`normalize_series`]). A trend is a
/// maximal run of same-direction deltas; flat deltas extend the running trend
/// and a trend is kept only if it spans at least two deltas. When the
/// direction flips, the new run starts at the turning point, so a turning
/// point belongs to both adjacent trends.
pub fn detect_patterns(series: &[PricePoint]) -> PricePattern {
    let mut pattern = PricePattern::default();
    let n = series.len();
    if n < 2 {
        return pattern;
    }

    for i in 1..n.saturating_sub(1) {
        let (prev, cur, next) = (series[i - 1].price, series[i].price, series[i + 1].price);
        if cur > prev && cur > next {
            pattern.peaks.push(PriceExtremum {
                index: i,
                time: series[i].time,
                price: cur,
            });
        } else if cur < prev && cur < next {
            pattern.valleys.push(PriceExtremum {
                index: i,
                time: series[i].time,
                price: cur,
            });
        }
    }

    let mut running: Option<(TrendDirection, usize)> = None;
    let mut flat_start = 0;

    for i in 1..n {
        let direction = delta_direction(series[i].price - series[i - 1].price);
        match (running, direction) {
            // Leading flats only move the start point
            (None, None) => flat_start = i,
            (None, Some(dir)) => running = Some((dir, flat_start)),
            (Some(_), None) => {}
            (Some((current, _)), Some(dir)) if current == dir => {}
            (Some((current, start)), Some(dir)) => {
                if i - 1 - start >= 2 {
                    pattern
                        .trends
                        .push(make_trend(series, current, start, i - 1));
                }
                running = Some((dir, i - 1));
            }
        }
    }

    if let Some((current, start)) = running
        && n - 1 - start >= 2
    {
        pattern.trends.push(make_trend(series, current, start, n - 1));
    }

    pattern
}

/// Everything derived from one price refresh. Recomputed per cycle, never persisted.
#[derive(Debug, Clone)]
pub struct PriceAnalysis {
    /// Time-ordered, de-duplicated series
    pub series: Vec<PricePoint>,
    pub stats: PriceSeriesStats,
    pub pattern: PricePattern,
    pub forecast: PriceForecast,
    /// Point in effect at analysis time, `None` when the series does not cover it
    pub current: Option<PricePoint>,
}

impl PriceAnalysis {
    pub fn analyze(prices: &[PricePoint], now: DateTime<Utc>) -> Self {
        let series = normalize_series(prices);
        let stats = compute_statistics(prices);
        let pattern = detect_patterns(&series);
        let forecast = build_forecast(&series, now);
        let current = current_price_point(&series, now).cloned();

        Self {
            series,
            stats,
            pattern,
            forecast,
            current,
        }
    }

    /// False when there is no price in effect (degraded mode)
    pub fn is_available(&self) -> bool {
        self.current.is_some()
    }

    /// Price in effect now, 0 when unavailable
    pub fn current_price(&self) -> f32 {
        self.current.as_ref().map_or(0.0, |p| p.price)
    }

    /// Normalized position of the current price over the whole series (0.5 when unavailable)
    pub fn normalized_price(&self) -> f32 {
        match &self.current {
            Some(point) => normalized_price(point.price, self.stats.min, self.stats.max),
            None => 0.5,
        }
    }

    pub fn position(&self) -> PricePosition {
        if self.is_available() {
            self.forecast.current_position
        } else {
            PricePosition::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(prices: &[f32]) -> Vec<PricePoint> {
        let base = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(base + Duration::hours(i as i64), p))
            .collect()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_statistics_empty_is_all_zero() {
        assert_eq!(compute_statistics(&[]), PriceSeriesStats::default());
    }

    #[test]
    fn test_statistics_identical_prices() {
        let stats = compute_statistics(&series(&[0.2; 7]));
        assert!(approx(stats.min, 0.2));
        assert!(approx(stats.max, 0.2));
        assert!(approx(stats.avg, 0.2));
        assert!(approx(stats.median, 0.2));
        assert!(approx(stats.std_dev, 0.0));
        assert!(approx(stats.volatility, 0.0));
    }

    #[test]
    fn test_statistics_known_values() {
        let stats = compute_statistics(&series(&[4.0, 1.0, 3.0, 2.0]));
        assert!(approx(stats.min, 1.0));
        assert!(approx(stats.max, 4.0));
        assert!(approx(stats.avg, 2.5));
        assert!(approx(stats.median, 2.5));
        // population std dev of 1..4
        assert!(approx(stats.std_dev, 1.118_034));
        // floor(4 * 0.25) = 1, floor(4 * 0.75) = 3
        assert!(approx(stats.p25, 2.0));
        assert!(approx(stats.p75, 4.0));
        assert!(approx(stats.volatility, 1.118_034 / 2.5));
    }

    #[test]
    fn test_statistics_zero_average_has_zero_volatility() {
        let stats = statistics_of(&[-1.0, 1.0]);
        assert!(approx(stats.avg, 0.0));
        assert!(approx(stats.volatility, 0.0));
    }

    #[test]
    fn test_normalized_price_bounds() {
        assert!(approx(normalized_price(0.05, 0.05, 0.25), 0.0));
        assert!(approx(normalized_price(0.25, 0.05, 0.25), 1.0));
        assert!(approx(normalized_price(0.15, 0.05, 0.25), 0.5));
        assert!((normalized_price(0.3, 0.3, 0.3) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_peak_and_trends_on_triangle() {
        let pattern = detect_patterns(&series(&[0.10, 0.20, 0.30, 0.20, 0.10]));

        assert_eq!(pattern.peaks.len(), 1);
        assert_eq!(pattern.peaks[0].index, 2);
        assert!(pattern.valleys.is_empty());

        assert_eq!(pattern.trends.len(), 2);
        let up = &pattern.trends[0];
        assert_eq!(up.direction, TrendDirection::Up);
        assert_eq!((up.start_index, up.end_index), (0, 2));
        assert!((up.change_percent - 200.0).abs() < 1e-3);

        let down = &pattern.trends[1];
        assert_eq!(down.direction, TrendDirection::Down);
        assert_eq!((down.start_index, down.end_index), (2, 4));
        assert!((down.change_percent + 66.666_67).abs() < 1e-3);
    }

    #[test]
    fn test_endpoints_are_never_extrema() {
        let pattern = detect_patterns(&series(&[0.5, 0.1, 0.5]));
        assert!(pattern.peaks.is_empty());
        assert_eq!(pattern.valleys.len(), 1);
        assert_eq!(pattern.valleys[0].index, 1);
    }

    #[test]
    fn test_flat_deltas_extend_trend() {
        let pattern = detect_patterns(&series(&[0.1, 0.2, 0.2, 0.3, 0.1]));
        assert_eq!(pattern.trends.len(), 1);
        assert_eq!(pattern.trends[0].direction, TrendDirection::Up);
        assert_eq!(pattern.trends[0].span(), 3);
    }

    #[test]
    fn test_single_delta_runs_are_not_trends() {
        let pattern = detect_patterns(&series(&[0.1, 0.2, 0.1, 0.2, 0.1]));
        assert!(pattern.trends.is_empty());
        assert_eq!(pattern.peaks.len(), 2);
        assert_eq!(pattern.valleys.len(), 1);
    }

    #[test]
    fn test_leading_flats_are_skipped() {
        let pattern = detect_patterns(&series(&[0.1, 0.1, 0.1, 0.2, 0.3]));
        assert_eq!(pattern.trends.len(), 1);
        assert_eq!(pattern.trends[0].start_index, 2);
    }

    #[test]
    fn test_normalize_series_sorts_and_dedups() {
        let mut points = series(&[0.1, 0.2, 0.3]);
        points.reverse();
        let duplicate = PricePoint::new(points[0].time, 0.9);
        points.push(duplicate);

        let normalized = normalize_series(&points);
        assert_eq!(normalized.len(), 3);
        assert!(normalized.windows(2).all(|w| w[0].time < w[1].time));
        assert!(approx(normalized[2].price, 0.9));
    }

    #[test]
    fn test_analysis_degrades_without_current_price() {
        let points = series(&[0.1, 0.2, 0.3]);
        let before = points[0].time - Duration::hours(5);
        let analysis = PriceAnalysis::analyze(&points, before);

        assert!(!analysis.is_available());
        assert!((analysis.normalized_price() - 0.5).abs() < f32::EPSILON);
        assert_eq!(analysis.position(), PricePosition::Medium);
        assert!(!analysis.forecast.upcoming_change.significant);
    }
}
