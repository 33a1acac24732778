//! Per-market aggregation of rolling windows across timeframes
//!
//! One `MarketDataContext` owns every window for a single market: price and
//! volume per configured timeframe, plus auxiliary buy-ratio and
//! inter-trade-interval windows. A window whose span disagrees with its
//! registration key is a construction-time error, never a deferred one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Trade;
use crate::error::{Result, TickflowError};
use crate::indicators::{IndicatorHealth, MetricsRegistry};
use crate::stats::RollingWindow;

/// A named timeframe with its retention span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    /// Registration key, e.g. "1m"
    pub name: String,
    /// Retention span in seconds; windows registered under this key must
    /// carry exactly this span
    pub span_secs: i64,
}

impl Timeframe {
    pub fn new(name: impl Into<String>, span_secs: i64) -> Self {
        Self {
            name: name.into(),
            span_secs,
        }
    }

    pub fn span(&self) -> Duration {
        Duration::seconds(self.span_secs)
    }
}

/// Which series a window tracks within a timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Series {
    Price,
    /// Per-trade notional (price x volume); window sums are windowed amount
    Volume,
}

/// Data-quality score for one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowQuality {
    pub timeframe: String,
    pub series: Series,
    pub samples: usize,
    pub empty: bool,
    pub sparse: bool,
    pub zero_variance: bool,
    /// 1.0 for a healthy window, lower for each defect
    pub score: f64,
}

/// Data-quality report for a whole context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub market: String,
    pub windows: Vec<WindowQuality>,
    /// Mean of the per-window scores, 0 when there are none
    pub overall: f64,
    pub indicator_health: Option<IndicatorHealth>,
}

/// All rolling windows for a single market
#[derive(Debug)]
pub struct MarketDataContext {
    market: String,
    /// (timeframe name -> window), ordered shortest span first
    price_windows: BTreeMap<String, RollingWindow>,
    volume_windows: BTreeMap<String, RollingWindow>,
    timeframes: Vec<Timeframe>,
    /// 1.0 per buy, 0.0 per sell; mean is the buy ratio
    buy_ratio: RollingWindow,
    /// Seconds between consecutive trades
    intervals: RollingWindow,
    last_trade_at: Option<DateTime<Utc>>,
}

impl MarketDataContext {
    /// Build a context with price and volume windows for every timeframe.
    /// Timeframes must be non-empty with unique names and positive spans.
    pub fn new(market: impl Into<String>, timeframes: &[Timeframe], aux_span: Duration) -> Result<Self> {
        let market = market.into();
        if timeframes.is_empty() {
            return Err(TickflowError::ContextLayout(format!(
                "market {market}: at least one timeframe is required"
            )));
        }

        let mut ctx = Self {
            market,
            price_windows: BTreeMap::new(),
            volume_windows: BTreeMap::new(),
            timeframes: Vec::new(),
            buy_ratio: RollingWindow::new(aux_span),
            intervals: RollingWindow::new(aux_span),
            last_trade_at: None,
        };

        let mut sorted: Vec<Timeframe> = timeframes.to_vec();
        sorted.sort_by_key(|tf| tf.span_secs);
        for tf in &sorted {
            ctx.register_window(tf, Series::Price, RollingWindow::new(tf.span()))?;
            ctx.register_window(tf, Series::Volume, RollingWindow::new(tf.span()))?;
        }
        ctx.timeframes = sorted;
        Ok(ctx)
    }

    /// Register one window under a timeframe key, verifying the span
    /// matches. A mismatch is fatal configuration, caught here and now.
    pub fn register_window(
        &mut self,
        timeframe: &Timeframe,
        series: Series,
        window: RollingWindow,
    ) -> Result<()> {
        if timeframe.span_secs <= 0 {
            return Err(TickflowError::ContextLayout(format!(
                "market {}: timeframe {} has non-positive span {}s",
                self.market, timeframe.name, timeframe.span_secs
            )));
        }
        if window.span() != timeframe.span() {
            return Err(TickflowError::ContextLayout(format!(
                "market {}: window span {}s does not match timeframe {} ({}s)",
                self.market,
                window.span().num_seconds(),
                timeframe.name,
                timeframe.span_secs
            )));
        }
        let target = match series {
            Series::Price => &mut self.price_windows,
            Series::Volume => &mut self.volume_windows,
        };
        if target.insert(timeframe.name.clone(), window).is_some() {
            return Err(TickflowError::ContextLayout(format!(
                "market {}: duplicate {:?} window for timeframe {}",
                self.market, series, timeframe.name
            )));
        }
        Ok(())
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    /// Fan a single tick out to every registered window
    pub fn update_all_windows(&mut self, trade: &Trade) {
        let price = trade.price_f64();
        let amount = trade.total_f64();
        let ts = trade.timestamp;

        for window in self.price_windows.values_mut() {
            window.add(price, ts);
        }
        for window in self.volume_windows.values_mut() {
            window.add(amount, ts);
        }

        let buy = if trade.side.is_buy() { 1.0 } else { 0.0 };
        self.buy_ratio.add(buy, ts);

        if let Some(last) = self.last_trade_at {
            let gap_secs = (ts - last).num_milliseconds() as f64 / 1000.0;
            self.intervals.add(gap_secs.max(0.0), ts);
        }
        self.last_trade_at = Some(ts);
    }

    pub fn price_window(&self, timeframe: &str) -> Option<&RollingWindow> {
        self.price_windows.get(timeframe)
    }

    pub fn volume_window(&self, timeframe: &str) -> Option<&RollingWindow> {
        self.volume_windows.get(timeframe)
    }

    fn shortest(&self) -> &Timeframe {
        // Construction guarantees at least one timeframe, sorted ascending
        &self.timeframes[0]
    }

    fn longest(&self) -> &Timeframe {
        &self.timeframes[self.timeframes.len() - 1]
    }

    /// Cheapest view: the price window with the smallest span
    pub fn shortest_price_window(&self) -> &RollingWindow {
        &self.price_windows[&self.shortest().name]
    }

    /// Most thorough view: the price window with the largest span
    pub fn longest_price_window(&self) -> &RollingWindow {
        &self.price_windows[&self.longest().name]
    }

    pub fn shortest_volume_window(&self) -> &RollingWindow {
        &self.volume_windows[&self.shortest().name]
    }

    pub fn longest_volume_window(&self) -> &RollingWindow {
        &self.volume_windows[&self.longest().name]
    }

    /// Fraction of recent trades that were buys, 0.5 when unknown
    pub fn buy_ratio(&self) -> f64 {
        if self.buy_ratio.is_empty() {
            return 0.5;
        }
        self.buy_ratio.mean()
    }

    pub fn buy_ratio_window(&self) -> &RollingWindow {
        &self.buy_ratio
    }

    pub fn interval_window(&self) -> &RollingWindow {
        &self.intervals
    }

    /// Total buffered samples across every window; drives the offload
    /// decision in the detector
    pub fn total_samples(&self) -> usize {
        self.price_windows.values().map(RollingWindow::len).sum::<usize>()
            + self.volume_windows.values().map(RollingWindow::len).sum::<usize>()
            + self.buy_ratio.len()
            + self.intervals.len()
    }

    fn score_window(tf: &Timeframe, series: Series, window: &RollingWindow) -> WindowQuality {
        let samples = window.len();
        let empty = samples == 0;
        // Sparse: fewer samples than one per fifth of the span, floor of 3
        let expected_floor = ((tf.span_secs / 5).max(3)) as usize;
        let sparse = !empty && samples < expected_floor.min(5);
        let zero_variance = samples >= 2 && window.variance() == 0.0;

        let mut score: f64 = 1.0;
        if empty {
            score = 0.0;
        } else {
            if sparse {
                score -= 0.4;
            }
            if zero_variance {
                score -= 0.3;
            }
        }

        WindowQuality {
            timeframe: tf.name.clone(),
            series,
            samples,
            empty,
            sparse,
            zero_variance,
            score: score.max(0.0),
        }
    }

    /// Score every window for emptiness, sparsity, and zero variance,
    /// optionally folding in indicator health from the registry
    pub fn data_quality(
        &self,
        registry: Option<&MetricsRegistry>,
        now: DateTime<Utc>,
    ) -> DataQualityReport {
        let mut windows = Vec::new();
        for tf in &self.timeframes {
            if let Some(w) = self.price_windows.get(&tf.name) {
                windows.push(Self::score_window(tf, Series::Price, w));
            }
            if let Some(w) = self.volume_windows.get(&tf.name) {
                windows.push(Self::score_window(tf, Series::Volume, w));
            }
        }
        let overall = if windows.is_empty() {
            0.0
        } else {
            windows.iter().map(|w| w.score).sum::<f64>() / windows.len() as f64
        };

        DataQualityReport {
            market: self.market.clone(),
            windows,
            overall,
            indicator_health: registry.and_then(|r| r.health(&self.market, now)),
        }
    }
}
