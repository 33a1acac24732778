//! Online MACD (fast/slow/signal EMAs) with stream-gap recovery

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// One MACD observation; `histogram == macd - signal` always holds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MacdSnapshot {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Incrementally updated MACD calculator
///
/// Same gap contract as the RSI: a gap beyond `max_gap` clears all state
/// and the revealing update only re-arms the clock.
#[derive(Debug, Clone)]
pub struct OnlineMacd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    max_gap: Duration,
    fast_ema: f64,
    slow_ema: f64,
    signal_ema: Option<f64>,
    /// Bounded history of MACD-line values
    history: VecDeque<f64>,
    prev_histogram: Option<f64>,
    crossed_up: bool,
    count: usize,
    last_update: Option<DateTime<Utc>>,
}

impl OnlineMacd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
        max_gap: Duration,
    ) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
            max_gap,
            fast_ema: 0.0,
            slow_ema: 0.0,
            signal_ema: None,
            history: VecDeque::new(),
            prev_histogram: None,
            crossed_up: false,
            count: 0,
            last_update: None,
        }
    }

    /// Clear all state atomically
    pub fn reset(&mut self) {
        self.fast_ema = 0.0;
        self.slow_ema = 0.0;
        self.signal_ema = None;
        self.history.clear();
        self.prev_histogram = None;
        self.crossed_up = false;
        self.count = 0;
        self.last_update = None;
    }

    fn alpha(period: usize) -> f64 {
        2.0 / (period as f64 + 1.0)
    }

    /// Feed one price observation
    pub fn update(&mut self, price: f64, timestamp: DateTime<Utc>) {
        if let Some(last) = self.last_update {
            if timestamp - last > self.max_gap {
                debug!(
                    gap_secs = (timestamp - last).num_seconds(),
                    "MACD stream gap exceeded max_gap, resetting"
                );
                self.reset();
                self.last_update = Some(timestamp);
                return;
            }
        }

        if self.count == 0 {
            // First sample seeds both EMAs to the price
            self.fast_ema = price;
            self.slow_ema = price;
        } else {
            let fa = Self::alpha(self.fast_period);
            let sa = Self::alpha(self.slow_period);
            self.fast_ema = fa * price + (1.0 - fa) * self.fast_ema;
            self.slow_ema = sa * price + (1.0 - sa) * self.slow_ema;
        }
        self.count += 1;

        // The MACD line is only defined once the slow EMA has seen enough
        if self.count >= self.slow_period {
            let macd = self.fast_ema - self.slow_ema;
            self.history.push_back(macd);
            while self.history.len() > self.signal_period * 2 {
                self.history.pop_front();
            }

            let signal = match self.signal_ema {
                // Signal EMA is seeded by the first MACD value
                None => macd,
                Some(prev) => {
                    let a = Self::alpha(self.signal_period);
                    a * macd + (1.0 - a) * prev
                }
            };
            self.signal_ema = Some(signal);

            let histogram = macd - signal;
            self.crossed_up = matches!(self.prev_histogram, Some(prev) if prev <= 0.0)
                && histogram > 0.0;
            self.prev_histogram = Some(histogram);
        }

        self.last_update = Some(timestamp);
    }

    /// Current MACD/signal/histogram; zeroed until ready
    pub fn snapshot(&self) -> MacdSnapshot {
        if !self.is_ready() {
            return MacdSnapshot::default();
        }
        let macd = self.fast_ema - self.slow_ema;
        let signal = self.signal_ema.unwrap_or(macd);
        MacdSnapshot {
            macd,
            signal,
            histogram: macd - signal,
        }
    }

    /// True when the last update moved the histogram from <= 0 to > 0
    pub fn bullish_cross(&self) -> bool {
        self.crossed_up
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.slow_period
    }

    /// True when the last update is further back than `max_gap`
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(last) => now - last > self.max_gap,
            None => true,
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    #[test]
    fn test_histogram_identity_every_observation() {
        let mut macd = OnlineMacd::new(3, 6, 4, Duration::seconds(300));
        let prices = [
            100.0, 101.0, 99.5, 102.0, 103.5, 103.0, 104.2, 102.8, 105.0, 106.1,
        ];
        for (i, p) in prices.iter().enumerate() {
            macd.update(*p, ts(i as i64));
            let snap = macd.snapshot();
            assert!((snap.histogram - (snap.macd - snap.signal)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_not_ready_before_slow_period() {
        let mut macd = OnlineMacd::new(3, 6, 4, Duration::seconds(300));
        for i in 0..5 {
            macd.update(100.0 + i as f64, ts(i));
            assert!(!macd.is_ready());
            let snap = macd.snapshot();
            assert_eq!(snap.macd, 0.0);
            assert_eq!(snap.signal, 0.0);
        }
        macd.update(106.0, ts(5));
        assert!(macd.is_ready());
    }

    #[test]
    fn test_uptrend_positive_histogram() {
        let mut macd = OnlineMacd::new(3, 8, 4, Duration::seconds(3_600));
        // Flat then rising: fast EMA pulls ahead of slow
        for i in 0..10 {
            macd.update(100.0, ts(i));
        }
        for i in 10..25 {
            macd.update(100.0 + (i - 9) as f64, ts(i));
        }
        let snap = macd.snapshot();
        assert!(snap.macd > 0.0);
        assert!(snap.histogram > 0.0);
    }

    #[test]
    fn test_gap_resets_state() {
        let mut macd = OnlineMacd::new(3, 5, 4, Duration::seconds(60));
        for i in 0..8 {
            macd.update(100.0 + i as f64, ts(i));
        }
        assert!(macd.is_ready());

        macd.update(150.0, ts(500));
        assert!(!macd.is_ready());
        assert_eq!(macd.history_len(), 0);
        assert_eq!(macd.snapshot().macd, 0.0);
    }

    #[test]
    fn test_bullish_cross_flag() {
        let mut macd = OnlineMacd::new(2, 4, 3, Duration::seconds(3_600));
        // Decline drives the histogram negative, then a sharp reversal
        // pushes it back through zero
        let prices = [
            100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 94.0, 100.0, 104.0, 108.0,
        ];
        let mut saw_cross = false;
        for (i, p) in prices.iter().enumerate() {
            macd.update(*p, ts(i as i64));
            saw_cross |= macd.bullish_cross();
        }
        assert!(saw_cross);
    }
}
