//! Immutable captures handed to the evaluation side of the detector
//!
//! A snapshot is built once per tick while holding the market's context
//! and is safe to ship across task boundaries; handlers never touch live
//! windows directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::MarketDataContext;
use crate::domain::{PatternType, Trade};
use crate::indicators::{self, MacdReading, MetricsRegistry, RsiReading};
use crate::patterns::PatternConfig;

/// Per-tick derived features computed over the market's windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Percent price change over the shortest price window
    pub change_pct: f64,
    /// Z-score of the trade price within the longest price window
    pub price_z: f64,
    /// Z-score of the trade notional within the longest volume window
    pub volume_z: f64,
    /// Total notional in the shortest volume window
    pub window_volume: f64,
    /// Total notional in the longest volume window
    pub long_volume: f64,
    /// Consecutive price increases in the shortest price window
    pub streak: usize,
    /// Regression slope of the shortest price window
    pub slope: f64,
    /// Regression fit of the shortest price window
    pub r_squared: f64,
    /// Share of buys among recent trades
    pub buy_ratio: f64,
    /// Variance of inter-trade gaps, seconds squared
    pub interval_variance: f64,
    /// Mean inter-trade gap, seconds
    pub mean_interval: f64,
    /// Trades inside the shortest price window
    pub trade_count: usize,
    /// Coefficient of variation of the shortest price window
    pub cv: f64,
    /// 1 - cv, clamped to [0, 1]
    pub stability: f64,
    /// (max - min) / min over the longest price window
    pub range_pct: f64,
    /// Where the trade price sits inside that range, [0, 1]
    pub range_position: f64,
    pub volume_spike_ratio: f64,
    pub burst_score: f64,
    pub rush_score: f64,
    pub jump_score: f64,
    pub rsi: RsiReading,
    pub macd: MacdReading,
}

impl FeatureSet {
    /// Derive every feature from the market's current windows
    pub fn capture(
        trade: &Trade,
        context: &MarketDataContext,
        registry: &MetricsRegistry,
        now: DateTime<Utc>,
    ) -> Self {
        let short_price = context.shortest_price_window();
        let long_price = context.longest_price_window();
        let short_volume = context.shortest_volume_window();
        let long_volume = context.longest_volume_window();

        let price = trade.price_f64();
        let notional = trade.total_f64();

        let buy_ratio = context.buy_ratio();
        let intervals = context.interval_window();
        let mean_interval = intervals.mean();
        let cv = short_price.cv();

        let (range_pct, range_position) = match (long_price.min(), long_price.max()) {
            (Some(min), Some(max)) if min > 0.0 && max > min => (
                (max - min) / min,
                ((price - min) / (max - min)).clamp(0.0, 1.0),
            ),
            _ => (0.0, 0.0),
        };

        Self {
            change_pct: short_price.change_pct(),
            price_z: long_price.z_score(price),
            volume_z: long_volume.z_score(notional),
            window_volume: short_volume.sum(),
            long_volume: long_volume.sum(),
            streak: short_price.consecutive_increases(),
            slope: short_price.slope(),
            r_squared: short_price.r_squared(),
            buy_ratio,
            interval_variance: intervals.variance(),
            mean_interval,
            trade_count: short_price.len(),
            cv,
            stability: (1.0 - cv).clamp(0.0, 1.0),
            range_pct,
            range_position,
            volume_spike_ratio: indicators::volume_spike_ratio(short_volume, long_volume),
            burst_score: indicators::burst_score(short_volume, long_volume, intervals),
            rush_score: indicators::rush_score(short_price, buy_ratio),
            jump_score: indicators::jump_score(long_price, long_volume),
            rsi: registry.rsi(&trade.market, now),
            macd: registry.macd(&trade.market, now),
        }
    }
}

/// Everything a handler needs to evaluate one tick, detached from the
/// live detector state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    pub trade: Trade,
    pub features: FeatureSet,
    /// Per-pattern threshold copies taken at capture time
    pub thresholds: HashMap<PatternType, HashMap<String, f64>>,
}

impl DetectionSnapshot {
    pub fn capture(
        trade: &Trade,
        context: &MarketDataContext,
        registry: &MetricsRegistry,
        config: &PatternConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let thresholds = PatternType::all()
            .into_iter()
            .map(|p| (p, config.snapshot(p)))
            .collect();
        Self {
            trade: trade.clone(),
            features: FeatureSet::capture(trade, context, registry, now),
            thresholds,
        }
    }

    /// Threshold lookup with a hard fallback for keys missing from the
    /// capture (never expected in practice)
    pub fn threshold(&self, pattern: PatternType, key: &str) -> f64 {
        self.thresholds
            .get(&pattern)
            .and_then(|m| m.get(key))
            .copied()
            .unwrap_or(f64::MAX)
    }
}
