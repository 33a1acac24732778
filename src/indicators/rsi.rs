//! Online RSI with Wilder smoothing and stream-gap recovery

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// Incrementally updated Relative Strength Index
///
/// A stream gap larger than `max_gap` fully resets the calculator; the
/// update that revealed the gap only re-arms the clock, it does not seed
/// the new history (state loss, not an error).
#[derive(Debug, Clone)]
pub struct OnlineRsi {
    period: usize,
    max_gap: Duration,
    /// Bounded price history (at most 2 x period)
    history: VecDeque<f64>,
    avg_gain: f64,
    avg_loss: f64,
    initialized: bool,
    last_update: Option<DateTime<Utc>>,
}

impl OnlineRsi {
    pub fn new(period: usize, max_gap: Duration) -> Self {
        Self {
            period,
            max_gap,
            history: VecDeque::new(),
            avg_gain: 0.0,
            avg_loss: 0.0,
            initialized: false,
            last_update: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Clear all state atomically
    pub fn reset(&mut self) {
        self.history.clear();
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.initialized = false;
        self.last_update = None;
    }

    /// Feed one price observation
    pub fn update(&mut self, price: f64, timestamp: DateTime<Utc>) {
        if let Some(last) = self.last_update {
            if timestamp - last > self.max_gap {
                debug!(
                    gap_secs = (timestamp - last).num_seconds(),
                    "RSI stream gap exceeded max_gap, resetting"
                );
                self.reset();
                self.last_update = Some(timestamp);
                return;
            }
        }

        let prev = self.history.back().copied();
        self.history.push_back(price);
        while self.history.len() > self.period * 2 {
            self.history.pop_front();
        }

        if self.initialized {
            // Wilder exponential update from the latest delta
            let delta = price - prev.unwrap_or(price);
            let gain = delta.max(0.0);
            let loss = (-delta).max(0.0);
            let p = self.period as f64;
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        } else if self.history.len() >= self.period + 1 {
            // Initial simple average over exactly `period` deltas
            let start = self.history.len() - self.period - 1;
            let mut gain_sum = 0.0;
            let mut loss_sum = 0.0;
            for i in start..self.history.len() - 1 {
                let delta = self.history[i + 1] - self.history[i];
                gain_sum += delta.max(0.0);
                loss_sum += (-delta).max(0.0);
            }
            let p = self.period as f64;
            self.avg_gain = gain_sum / p;
            self.avg_loss = loss_sum / p;
            self.initialized = true;
        }

        self.last_update = Some(timestamp);
    }

    /// Current RSI in [0, 100]; 50 until initialized (by convention)
    pub fn current(&self) -> f64 {
        if !self.initialized {
            return 50.0;
        }
        if self.avg_loss == 0.0 {
            return if self.avg_gain > 0.0 { 100.0 } else { 50.0 };
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }

    pub fn is_ready(&self) -> bool {
        self.initialized
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
    fn test_warm_up_all_gains() {
        let mut rsi = OnlineRsi::new(14, Duration::seconds(300));
        for i in 0..15 {
            rsi.update(100.0 + i as f64, ts(i));
        }
        assert!(rsi.is_ready());
        assert!(rsi.current() > 95.0);
    }

    #[test]
    fn test_default_until_initialized() {
        let mut rsi = OnlineRsi::new(14, Duration::seconds(300));
        for i in 0..14 {
            rsi.update(100.0 + i as f64, ts(i));
            assert!(!rsi.is_ready());
            assert_eq!(rsi.current(), 50.0);
        }
    }

    #[test]
    fn test_bounded_in_0_100() {
        let mut rsi = OnlineRsi::new(5, Duration::seconds(300));
        let prices = [10.0, 8.0, 12.0, 7.0, 15.0, 6.0, 18.0, 5.0, 20.0, 4.0];
        for (i, p) in prices.iter().enumerate() {
            rsi.update(*p, ts(i as i64));
            let value = rsi.current();
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_gap_resets_state() {
        let mut rsi = OnlineRsi::new(3, Duration::seconds(60));
        for i in 0..5 {
            rsi.update(100.0 + i as f64, ts(i));
        }
        assert!(rsi.is_ready());

        // Second update far beyond max_gap: full state loss
        rsi.update(200.0, ts(1_000));
        assert!(!rsi.is_ready());
        assert_eq!(rsi.history_len(), 0);
        assert_eq!(rsi.current(), 50.0);

        // The calculator recovers from fresh data after the gap
        for i in 0..4 {
            rsi.update(200.0 + i as f64, ts(1_001 + i));
        }
        assert!(rsi.is_ready());
    }

    #[test]
    fn test_staleness() {
        let mut rsi = OnlineRsi::new(14, Duration::seconds(60));
        assert!(rsi.is_stale(ts(0)));

        rsi.update(100.0, ts(0));
        assert!(!rsi.is_stale(ts(30)));
        assert!(rsi.is_stale(ts(61)));
    }

    #[test]
    fn test_downtrend_reads_low() {
        let mut rsi = OnlineRsi::new(5, Duration::seconds(300));
        for i in 0..10 {
            rsi.update(100.0 - i as f64, ts(i));
        }
        assert!(rsi.is_ready());
        assert!(rsi.current() < 5.0);
    }
}
