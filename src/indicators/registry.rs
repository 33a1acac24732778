//! Per-market indicator registry
//!
//! An explicit registry owned by the caller (no process-wide singleton):
//! one RSI + MACD pair is created lazily per market, fed through a single
//! `update_price` entry point, and evicted in bulk once a market has been
//! idle beyond the retention window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::divergence::detect_divergence;
use super::macd::{MacdSnapshot, OnlineMacd};
use super::rsi::OnlineRsi;
use crate::domain::DivergenceInfo;
use crate::stats::RollingWindow;

/// Calculator parameters shared by every market in a registry
#[derive(Debug, Clone)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Largest tolerated gap between updates before a full reset
    pub max_gap: Duration,
    /// Span of the per-market RSI track used for divergence
    pub divergence_lookback: Duration,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            max_gap: Duration::seconds(300),
            divergence_lookback: Duration::seconds(120),
        }
    }
}

/// RSI read result; `is_default` marks the conservative fallback that
/// detection logic must never treat as genuine signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RsiReading {
    pub value: f64,
    pub is_default: bool,
}

impl RsiReading {
    fn fallback() -> Self {
        Self {
            value: 50.0,
            is_default: true,
        }
    }
}

/// MACD read result with the same default-marking contract
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdReading {
    pub snapshot: MacdSnapshot,
    pub bullish_cross: bool,
    pub is_default: bool,
}

impl MacdReading {
    fn fallback() -> Self {
        Self {
            snapshot: MacdSnapshot::default(),
            bullish_cross: false,
            is_default: true,
        }
    }
}

/// Read-only per-market indicator health for the diagnostics surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorHealth {
    pub market: String,
    pub rsi_ready: bool,
    pub macd_ready: bool,
    pub stale: bool,
    pub age_secs: Option<i64>,
}

#[derive(Debug)]
struct MarketIndicators {
    rsi: OnlineRsi,
    macd: OnlineMacd,
    /// Recent RSI values, tracked for the divergence comparison
    rsi_track: RollingWindow,
    last_update: DateTime<Utc>,
}

/// Registry of online calculators keyed by market identifier
#[derive(Debug)]
pub struct MetricsRegistry {
    settings: IndicatorSettings,
    markets: HashMap<String, MarketIndicators>,
}

impl MetricsRegistry {
    pub fn new(settings: IndicatorSettings) -> Self {
        Self {
            settings,
            markets: HashMap::new(),
        }
    }

    /// Single entry point feeding every calculator for `market`
    pub fn update_price(&mut self, market: &str, price: f64, timestamp: DateTime<Utc>) {
        let settings = &self.settings;
        let entry = self
            .markets
            .entry(market.to_string())
            .or_insert_with(|| MarketIndicators {
                rsi: OnlineRsi::new(settings.rsi_period, settings.max_gap),
                macd: OnlineMacd::new(
                    settings.macd_fast,
                    settings.macd_slow,
                    settings.macd_signal,
                    settings.max_gap,
                ),
                rsi_track: RollingWindow::new(settings.divergence_lookback),
                last_update: timestamp,
            });

        entry.rsi.update(price, timestamp);
        entry.macd.update(price, timestamp);
        if entry.rsi.is_ready() {
            entry.rsi_track.add(entry.rsi.current(), timestamp);
        }
        entry.last_update = timestamp;
    }

    /// RSI for `market`, falling back to the neutral default when the
    /// calculator is absent, not ready, or stale
    pub fn rsi(&self, market: &str, now: DateTime<Utc>) -> RsiReading {
        match self.markets.get(market) {
            Some(m) if m.rsi.is_ready() && !m.rsi.is_stale(now) => RsiReading {
                value: m.rsi.current(),
                is_default: false,
            },
            _ => RsiReading::fallback(),
        }
    }

    /// MACD for `market`, all-zero default under the same conditions
    pub fn macd(&self, market: &str, now: DateTime<Utc>) -> MacdReading {
        match self.markets.get(market) {
            Some(m) if m.macd.is_ready() && !m.macd.is_stale(now) => MacdReading {
                snapshot: m.macd.snapshot(),
                bullish_cross: m.macd.bullish_cross(),
                is_default: false,
            },
            _ => MacdReading::fallback(),
        }
    }

    /// Best-effort divergence between price trend and the RSI track
    pub fn divergence(
        &self,
        market: &str,
        price_window: &RollingWindow,
        now: DateTime<Utc>,
    ) -> Option<DivergenceInfo> {
        let m = self.markets.get(market)?;
        if !m.rsi.is_ready() || m.rsi.is_stale(now) {
            return None;
        }
        detect_divergence(price_window, &m.rsi_track)
    }

    /// Per-market health snapshot, if the market is known
    pub fn health(&self, market: &str, now: DateTime<Utc>) -> Option<IndicatorHealth> {
        self.markets.get(market).map(|m| IndicatorHealth {
            market: market.to_string(),
            rsi_ready: m.rsi.is_ready(),
            macd_ready: m.macd.is_ready(),
            stale: m.rsi.is_stale(now) || m.macd.is_stale(now),
            age_secs: Some((now - m.last_update).num_seconds()),
        })
    }

    /// Health snapshots for every tracked market
    pub fn all_health(&self, now: DateTime<Utc>) -> Vec<IndicatorHealth> {
        let mut health: Vec<IndicatorHealth> = self
            .markets
            .keys()
            .filter_map(|market| self.health(market, now))
            .collect();
        health.sort_by(|a, b| a.market.cmp(&b.market));
        health
    }

    /// Drop markets idle beyond `retention`; returns how many were removed
    pub fn cleanup_idle(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.markets.len();
        self.markets.retain(|_, m| now - m.last_update <= retention);
        let removed = before - self.markets.len();
        if removed > 0 {
            debug!(removed, "evicted idle markets from indicator registry");
        }
        removed
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }
}
