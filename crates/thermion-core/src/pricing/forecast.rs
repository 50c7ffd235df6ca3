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

use super::statistics_of;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::cmp::Ordering;
use thermion_types::{PriceForecast, PricePoint, PricePosition, UpcomingChange};

/// |change| at or above this percentage counts as significant
pub const SIGNIFICANT_CHANGE_PERCENT: f32 = 15.0;

/// How many future points are scanned for an upcoming change
pub const LOOKAHEAD_POINTS: usize = 6;

/// Number of best/worst points reported
const RANKED_POINTS: usize = 3;

/// Latest point at or before `now`. Expects a time-ordered series.
pub fn current_price_point(series: &[PricePoint], now: DateTime<Utc>) -> Option<&PricePoint> {
    series.iter().take_while(|p| p.time <= now).last()
}

fn percent_change(from: f32, to: f32) -> f32 {
    if from.abs() > f32::EPSILON {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

fn upcoming_change(future: &[PricePoint], current_price: Option<f32>) -> UpcomingChange {
    let Some(current) = current_price else {
        return UpcomingChange::default();
    };

    let mut best: Option<(f32, &PricePoint)> = None;
    for point in future.iter().take(LOOKAHEAD_POINTS) {
        let pct = percent_change(current, point.price);
        if best.is_none_or(|(b, _)| pct.abs() > b.abs()) {
            best = Some((pct, point));
        }
    }

    match best {
        Some((pct, point)) => UpcomingChange {
            significant: pct.abs() >= SIGNIFICANT_CHANGE_PERCENT,
            change_percent: pct,
            time: Some(point.time),
            price: Some(point.price),
        },
        None => UpcomingChange::default(),
    }
}

fn recommendation(position: PricePosition, change: &UpcomingChange) -> String {
    let pct = change.change_percent.abs();
    match position {
        PricePosition::Low if change.is_increase() => {
            format!("Price is low and will rise {pct:.0}% soon: pre-heat now")
        }
        PricePosition::Low => "Price is low: good time to heat".to_string(),
        PricePosition::High if change.is_decrease() => {
            format!("Price is high and will drop {pct:.0}% soon: defer heating")
        }
        PricePosition::High => "Price is high: reduce consumption".to_string(),
        PricePosition::Medium if change.is_increase() => {
            format!("Price will rise {pct:.0}% soon: consider heating now")
        }
        PricePosition::Medium if change.is_decrease() => {
            format!("Price will drop {pct:.0}% soon: consider waiting")
        }
        PricePosition::Medium => "Price is average: maintain normal operation".to_string(),
    }
}

fn ranked(points: &[PricePoint], order: impl Fn(f32, f32) -> Ordering) -> Vec<PricePoint> {
    let mut sorted: Vec<PricePoint> = points.to_vec();
    sorted.sort_by(|a, b| order(a.price, b.price));
    sorted.truncate(RANKED_POINTS);
    sorted
}

/// Build the forward-looking summary for the hour containing `now`.
///
/// Only points from the next hour on count as future. With no future point
/// the "no future data" sentinel is returned.
pub fn build_forecast(series: &[PricePoint], now: DateTime<Utc>) -> PriceForecast {
    let current = current_price_point(series, now);
    let current_price = current.map(|p| p.price);
    let source_position = current.and_then(|p| p.level).map(|level| level.position());

    let hour_start = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    let next_hour = hour_start + Duration::hours(1);
    let future: Vec<PricePoint> = series
        .iter()
        .filter(|p| p.time >= next_hour)
        .cloned()
        .collect();

    if future.is_empty() {
        return PriceForecast::no_future_data(
            current_price,
            source_position.unwrap_or(PricePosition::Medium),
        );
    }

    let future_values: Vec<f32> = future.iter().map(|p| p.price).collect();
    let stats = statistics_of(&future_values);

    let current_position = match (source_position, current_price) {
        (Some(position), _) => position,
        (None, Some(price)) if price <= stats.p25 => PricePosition::Low,
        (None, Some(price)) if price >= stats.p75 => PricePosition::High,
        _ => PricePosition::Medium,
    };

    let upcoming_change = upcoming_change(&future, current_price);

    let horizon = now + Duration::hours(24);
    let next_day: Vec<PricePoint> = future
        .iter()
        .filter(|p| p.time < horizon)
        .cloned()
        .collect();

    PriceForecast {
        has_future_data: true,
        current_price,
        current_position,
        recommendation: recommendation(current_position, &upcoming_change),
        upcoming_change,
        best_times: ranked(&next_day, |a, b| a.total_cmp(&b)),
        worst_times: ranked(&next_day, |a, b| b.total_cmp(&a)),
    }
}
