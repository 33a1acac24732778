//! Stateless custom indicators computed directly from rolling windows
//!
//! These are pure functions of the windows they are handed; per-market
//! state lives in the windows and the registry, never here.

use crate::stats::RollingWindow;

/// Ratio of short-horizon to long-horizon price dispersion
///
/// Values above 1 mean volatility is building faster than its baseline.
pub fn volatility_acceleration(short_price: &RollingWindow, long_price: &RollingWindow) -> f64 {
    let long_cv = long_price.cv();
    if long_cv == 0.0 {
        return 0.0;
    }
    short_price.cv() / long_cv
}

/// Short-window mean trade size relative to the long-window baseline
pub fn volume_spike_ratio(short_volume: &RollingWindow, long_volume: &RollingWindow) -> f64 {
    let baseline = long_volume.mean();
    if baseline == 0.0 {
        return 0.0;
    }
    short_volume.mean() / baseline
}

/// Flow depth scaled down by price dispersion: heavy turnover at stable
/// prices scores high, the same turnover in a volatile tape scores low
pub fn liquidity_score(price: &RollingWindow, volume: &RollingWindow) -> f64 {
    let turnover = volume.sum().max(0.0);
    let dispersion = price.cv().abs().min(1.0);
    turnover.ln_1p() * (1.0 - dispersion)
}

/// Burst: volume spiking while trades arrive faster than usual
pub fn burst_score(
    short_volume: &RollingWindow,
    long_volume: &RollingWindow,
    intervals: &RollingWindow,
) -> f64 {
    let spike = volume_spike_ratio(short_volume, long_volume);
    let mean_interval = intervals.mean().max(0.0);
    spike / (1.0 + mean_interval)
}

/// Rush: directional price push weighted by buy-side dominance
pub fn rush_score(price: &RollingWindow, buy_ratio: f64) -> f64 {
    let pressure = (2.0 * buy_ratio - 1.0).clamp(-1.0, 1.0);
    price.change_pct() * pressure
}

/// Price position inside the recent range, scaled by log volume
///
/// 0 when the price sits at the bottom of the range or the range is
/// degenerate; grows with both range position and traded volume.
pub fn jump_score(price: &RollingWindow, volume: &RollingWindow) -> f64 {
    let (Some(min), Some(max), Some(last)) = (price.min(), price.max(), price.latest()) else {
        return 0.0;
    };
    let range = max - min;
    if range <= 0.0 {
        return 0.0;
    }
    let position = ((last - min) / range).clamp(0.0, 1.0);
    position * volume.sum().max(0.0).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn window_with(values: &[f64], span_secs: i64) -> RollingWindow {
        let mut w = RollingWindow::new(Duration::seconds(span_secs));
        for (i, v) in values.iter().enumerate() {
            w.add(*v, ts(i as i64));
        }
        w
    }

    #[test]
    fn test_volume_spike_ratio() {
        let short = window_with(&[300.0, 300.0], 600);
        let long = window_with(&[100.0, 100.0, 100.0, 100.0], 600);
        assert!((volume_spike_ratio(&short, &long) - 3.0).abs() < 1e-9);

        let empty = RollingWindow::new(Duration::seconds(600));
        assert_eq!(volume_spike_ratio(&short, &empty), 0.0);
    }

    #[test]
    fn test_jump_score_at_range_top() {
        let price = window_with(&[100.0, 95.0, 98.0, 105.0], 600);
        let volume = window_with(&[1_000.0, 2_000.0], 600);
        let score = jump_score(&price, &volume);
        assert!(score > 0.0);
        // Price at the very top of the range: position factor is 1
        assert!((score - (3_000.0f64).ln_1p()).abs() < 1e-9);
    }

    #[test]
    fn test_jump_score_degenerate_range() {
        let price = window_with(&[100.0, 100.0, 100.0], 600);
        let volume = window_with(&[1_000.0], 600);
        assert_eq!(jump_score(&price, &volume), 0.0);
    }

    #[test]
    fn test_rush_score_sign_follows_pressure() {
        let rising = window_with(&[100.0, 101.0], 600);
        assert!(rush_score(&rising, 0.9) > 0.0);
        assert!(rush_score(&rising, 0.1) < 0.0);
        assert_eq!(rush_score(&rising, 0.5), 0.0);
    }

    #[test]
    fn test_liquidity_prefers_stable_prices() {
        let stable = window_with(&[100.0, 100.1, 99.9, 100.0], 600);
        let choppy = window_with(&[100.0, 120.0, 80.0, 110.0], 600);
        let volume = window_with(&[5_000.0, 5_000.0], 600);
        assert!(liquidity_score(&stable, &volume) > liquidity_score(&choppy, &volume));
    }
}
