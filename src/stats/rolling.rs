//! Time-span rolling window with O(1) incremental statistics
//!
//! Every derived statistic (mean, variance, z-score, regression line, R^2)
//! is computed from five running accumulators, never by re-scanning the
//! retained samples. Eviction subtracts exactly what insertion added.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// One (value, timestamp) observation owned by the window
#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    timestamp: DateTime<Utc>,
}

/// Fixed-time-span sliding buffer of numeric samples
///
/// Invariant: the accumulators always equal the aggregates of exactly the
/// samples currently retained. The regression x-axis is seconds relative to
/// an origin fixed at the first sample ever added (reset only by `clear`),
/// so add/evict pairs cancel exactly.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    span: Duration,
    samples: VecDeque<Sample>,
    /// Sum of values (Σy)
    sum: f64,
    /// Sum of squared values (Σy²)
    sum_sq: f64,
    /// Regression sums over x = seconds since origin
    sum_x: f64,
    sum_xx: f64,
    sum_xy: f64,
    x_origin: Option<DateTime<Utc>>,
    /// Length of the strictly-increasing run ending at the newest sample
    streak: usize,
}

impl RollingWindow {
    /// Create a window retaining samples for `span`
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            samples: VecDeque::new(),
            sum: 0.0,
            sum_sq: 0.0,
            sum_x: 0.0,
            sum_xx: 0.0,
            sum_xy: 0.0,
            x_origin: None,
            streak: 0,
        }
    }

    /// The configured retention span
    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn x_of(&self, timestamp: DateTime<Utc>) -> f64 {
        let origin = self.x_origin.unwrap_or(timestamp);
        (timestamp - origin).num_milliseconds() as f64 / 1000.0
    }

    /// Insert a sample and evict everything older than `timestamp - span`
    pub fn add(&mut self, value: f64, timestamp: DateTime<Utc>) {
        if self.x_origin.is_none() {
            self.x_origin = Some(timestamp);
        }

        let cutoff = timestamp - self.span;
        let mut evicted = false;
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                let old = *front;
                self.samples.pop_front();
                let x = self.x_of(old.timestamp);
                self.sum -= old.value;
                self.sum_sq -= old.value * old.value;
                self.sum_x -= x;
                self.sum_xx -= x * x;
                self.sum_xy -= x * old.value;
                evicted = true;
            } else {
                break;
            }
        }

        // Streak update before push: compare against the current newest
        match self.samples.back() {
            Some(last) if value > last.value => self.streak += 1,
            Some(_) => self.streak = 0,
            None => self.streak = 0,
        }

        let x = self.x_of(timestamp);
        self.sum += value;
        self.sum_sq += value * value;
        self.sum_x += x;
        self.sum_xx += x * x;
        self.sum_xy += x * value;
        self.samples.push_back(Sample { value, timestamp });

        // Eviction can shorten a run that started on an evicted sample
        if evicted {
            self.streak = self.rescan_streak();
        }
    }

    /// Backward scan over retained samples, bounded by window size
    fn rescan_streak(&self) -> usize {
        let mut streak = 0;
        let mut iter = self.samples.iter().rev();
        if let Some(mut current) = iter.next() {
            for prev in iter {
                if current.value > prev.value {
                    streak += 1;
                    current = prev;
                } else {
                    break;
                }
            }
        }
        streak
    }

    /// Drop all samples and reset every accumulator
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.sum_x = 0.0;
        self.sum_xx = 0.0;
        self.sum_xy = 0.0;
        self.x_origin = None;
        self.streak = 0;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    /// Bessel-corrected sample variance, clamped to >= 0
    pub fn variance(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let n = n as f64;
        ((self.sum_sq - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
    }

    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard-deviation distance of `x` from the window mean
    pub fn z_score(&self, x: f64) -> f64 {
        let sd = self.stdev();
        if sd == 0.0 {
            return 0.0;
        }
        (x - self.mean()) / sd
    }

    /// Coefficient of variation (stdev / |mean|)
    pub fn cv(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            return 0.0;
        }
        self.stdev() / mean.abs()
    }

    /// Least-squares slope of value over time (units per second)
    pub fn slope(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let n = n as f64;
        let denom = n * self.sum_xx - self.sum_x * self.sum_x;
        if denom <= 0.0 {
            return 0.0;
        }
        (n * self.sum_xy - self.sum_x * self.sum) / denom
    }

    pub fn intercept(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        (self.sum - self.slope() * self.sum_x) / n as f64
    }

    /// Goodness of the linear fit, clamped to [0, 1]
    pub fn r_squared(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let n = n as f64;
        let sxx = n * self.sum_xx - self.sum_x * self.sum_x;
        let syy = n * self.sum_sq - self.sum * self.sum;
        let denom = sxx * syy;
        if denom <= 0.0 {
            return 0.0;
        }
        let sxy = n * self.sum_xy - self.sum_x * self.sum;
        ((sxy * sxy) / denom).clamp(0.0, 1.0)
    }

    /// Signed correlation: sqrt(R^2) carrying the slope's sign
    pub fn correlation(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let r = self.r_squared().sqrt();
        if self.slope() < 0.0 {
            -r
        } else {
            r
        }
    }

    /// Length of the strictly-increasing run ending at the newest sample
    pub fn consecutive_increases(&self) -> usize {
        self.streak
    }

    /// Retained values, oldest first (O(n))
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn min(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    pub fn max(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn first(&self) -> Option<f64> {
        self.samples.front().map(|s| s.value)
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|s| s.value)
    }

    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Percent change from the oldest to the newest retained value
    pub fn change_pct(&self) -> f64 {
        match (self.first(), self.latest()) {
            (Some(first), Some(last)) if first != 0.0 => (last - first) / first * 100.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const TOL: f64 = 1e-7;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    /// Reference statistics recomputed from scratch over retained samples
    fn reference_stats(values: &[(f64, f64)]) -> (f64, f64, f64, f64) {
        let n = values.len() as f64;
        let sum: f64 = values.iter().map(|(_, y)| y).sum();
        let mean = sum / n;
        let variance = if values.len() < 2 {
            0.0
        } else {
            values.iter().map(|(_, y)| (y - mean).powi(2)).sum::<f64>() / (n - 1.0)
        };
        let mean_x: f64 = values.iter().map(|(x, _)| x).sum::<f64>() / n;
        let sxx: f64 = values.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
        let sxy: f64 = values
            .iter()
            .map(|(x, y)| (x - mean_x) * (y - mean))
            .sum();
        let slope = if values.len() < 2 || sxx == 0.0 {
            0.0
        } else {
            sxy / sxx
        };
        let syy: f64 = values.iter().map(|(_, y)| (y - mean).powi(2)).sum();
        let r2 = if values.len() < 2 || sxx * syy == 0.0 {
            0.0
        } else {
            (sxy * sxy) / (sxx * syy)
        };
        (mean, variance, slope, r2)
    }

    #[test]
    fn test_accumulators_match_recompute_under_random_feed() {
        let mut rng = rand::thread_rng();
        let mut window = RollingWindow::new(Duration::seconds(30));
        let mut retained: Vec<(i64, f64)> = Vec::new();

        let mut t = 0i64;
        for i in 0..500 {
            t += rng.gen_range(1..=3);
            let value = rng.gen_range(-50.0..150.0);
            window.add(value, ts(t));
            retained.push((t, value));
            let cutoff = t - 30;
            retained.retain(|(s, _)| *s >= cutoff);

            let reference: Vec<(f64, f64)> =
                retained.iter().map(|(s, v)| (*s as f64, *v)).collect();
            let (mean, variance, slope, r2) = reference_stats(&reference);

            assert_eq!(window.len(), retained.len());
            assert!((window.sum() - reference.iter().map(|(_, y)| y).sum::<f64>()).abs() < TOL);
            assert!((window.mean() - mean).abs() < TOL, "mean at step {i}");
            assert!((window.variance() - variance).abs() < 1e-6, "variance at step {i}");
            assert!((window.slope() - slope).abs() < 1e-5, "slope at step {i}");
            assert!((window.r_squared() - r2).abs() < 1e-5, "r2 at step {i}");
        }
    }

    #[test]
    fn test_evicted_samples_do_not_influence_stats() {
        let mut window = RollingWindow::new(Duration::seconds(10));
        window.add(1_000_000.0, ts(0));
        window.add(10.0, ts(20));
        window.add(12.0, ts(21));

        // The outlier fell out of the span, so stats reflect 10 and 12 only
        assert_eq!(window.len(), 2);
        assert!((window.mean() - 11.0).abs() < TOL);
        assert!((window.variance() - 2.0).abs() < TOL);
    }

    #[test]
    fn test_streak_counts_and_breaks() {
        let mut window = RollingWindow::new(Duration::seconds(100));
        for (i, v) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            window.add(*v, ts(i as i64));
        }
        assert_eq!(window.consecutive_increases(), 3);

        window.add(2.5, ts(4));
        assert_eq!(window.consecutive_increases(), 0);

        window.add(2.6, ts(5));
        assert_eq!(window.consecutive_increases(), 1);
    }

    #[test]
    fn test_streak_rescanned_after_eviction() {
        let mut window = RollingWindow::new(Duration::seconds(5));
        window.add(1.0, ts(0));
        window.add(2.0, ts(1));
        window.add(3.0, ts(2));
        assert_eq!(window.consecutive_increases(), 2);

        // The oldest sample fell out, so the run is re-derived from the
        // three retained values (2, 3, 4)
        window.add(4.0, ts(6));
        assert_eq!(window.len(), 3);
        assert_eq!(window.consecutive_increases(), 2);
    }

    #[test]
    fn test_small_sample_edge_cases() {
        let mut window = RollingWindow::new(Duration::seconds(60));
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.variance(), 0.0);

        window.add(5.0, ts(0));
        assert_eq!(window.variance(), 0.0);
        assert_eq!(window.slope(), 0.0);
        assert_eq!(window.r_squared(), 0.0);
        assert_eq!(window.correlation(), 0.0);
        // stdev == 0 => z-score is 0 by contract
        assert_eq!(window.z_score(100.0), 0.0);

        // Constant values: cv guards the non-zero mean, variance stays 0
        window.add(5.0, ts(1));
        assert_eq!(window.cv(), 0.0);
    }

    #[test]
    fn test_perfect_uptrend_regression() {
        let mut window = RollingWindow::new(Duration::seconds(600));
        for i in 0..20 {
            window.add(100.0 + i as f64, ts(i));
        }
        assert!((window.slope() - 1.0).abs() < TOL);
        assert!((window.r_squared() - 1.0).abs() < TOL);
        assert!((window.correlation() - 1.0).abs() < TOL);
        assert!((window.intercept() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut window = RollingWindow::new(Duration::seconds(60));
        window.add(1.0, ts(0));
        window.add(2.0, ts(1));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.sum(), 0.0);
        assert_eq!(window.consecutive_increases(), 0);
        assert_eq!(window.change_pct(), 0.0);
    }

    #[test]
    fn test_change_pct() {
        let mut window = RollingWindow::new(Duration::seconds(600));
        window.add(100.0, ts(0));
        window.add(100.6, ts(60));
        assert!((window.change_pct() - 0.6).abs() < 1e-9);
    }
}
