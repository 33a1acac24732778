//! Pattern detection orchestration
//!
//! The detector owns the per-market indicator registry, the validated
//! threshold store, and the cooldown table. Callers feed it one trade at
//! a time per market; everything beyond the cooldown table is recomputed
//! per tick.

pub mod cooldown;
pub mod handlers;
pub mod snapshot;
pub mod worker;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::{DataQualityReport, MarketDataContext};
use crate::domain::{DivergenceDirection, DivergenceInfo, PatternType, Signal, Trade};
use crate::error::{Result, TickflowError};
use crate::indicators::{IndicatorHealth, IndicatorSettings, MetricsRegistry};
use crate::patterns::PatternConfig;

pub use cooldown::{ActiveCooldown, CooldownTable};
pub use handlers::Detection;
pub use snapshot::{DetectionSnapshot, FeatureSet};
pub use worker::WorkerPool;

/// Knobs for the detector itself; window layout and indicator periods
/// live in their own settings types
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Buffered samples across a context's windows beyond which
    /// evaluation is shipped to the worker pool
    pub offload_threshold: usize,
    pub worker_pool_size: usize,
    pub worker_reply_timeout: StdDuration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            offload_threshold: 5_000,
            worker_pool_size: 2,
            worker_reply_timeout: StdDuration::from_millis(250),
        }
    }
}

/// Detects the six pattern families on a per-tick basis
#[derive(Debug)]
pub struct PatternDetector {
    registry: MetricsRegistry,
    config: Arc<RwLock<PatternConfig>>,
    cooldowns: CooldownTable,
    settings: DetectorSettings,
    pool: Option<WorkerPool>,
    /// Highest trade sequence ingested per market, so repeated
    /// `detect_pattern` calls for one tick feed state exactly once
    ingested: DashMap<String, u64>,
}

impl PatternDetector {
    /// Detector without a worker pool; every evaluation is synchronous
    pub fn new(indicators: IndicatorSettings, config: PatternConfig) -> Self {
        Self {
            registry: MetricsRegistry::new(indicators),
            config: Arc::new(RwLock::new(config)),
            cooldowns: CooldownTable::new(),
            settings: DetectorSettings::default(),
            pool: None,
            ingested: DashMap::new(),
        }
    }

    /// Detector with an offload pool sized per `settings`. Must be built
    /// inside a tokio runtime.
    pub fn with_offload(
        indicators: IndicatorSettings,
        config: PatternConfig,
        settings: DetectorSettings,
    ) -> Self {
        let pool = WorkerPool::new(settings.worker_pool_size, settings.worker_reply_timeout);
        info!(
            workers = pool.worker_count(),
            offload_threshold = settings.offload_threshold,
            "pattern detector started with offload pool"
        );
        Self {
            registry: MetricsRegistry::new(indicators),
            config: Arc::new(RwLock::new(config)),
            cooldowns: CooldownTable::new(),
            settings,
            pool: Some(pool),
            ingested: DashMap::new(),
        }
    }

    /// Shared handle to the threshold store, for runtime tuning
    pub fn config_handle(&self) -> Arc<RwLock<PatternConfig>> {
        Arc::clone(&self.config)
    }

    /// Feed the trade into the context windows and the indicator
    /// registry, once per (market, seq) no matter how many patterns are
    /// checked against the same tick
    fn ingest(&mut self, trade: &Trade, context: &mut MarketDataContext) {
        let seen = self
            .ingested
            .get(&trade.market)
            .map(|entry| *entry.value());
        if seen.is_some_and(|s| s >= trade.seq) {
            return;
        }
        context.update_all_windows(trade);
        self.registry
            .update_price(&trade.market, trade.price_f64(), trade.timestamp);
        self.ingested.insert(trade.market.clone(), trade.seq);
    }

    /// Evaluate one pattern against one trade
    ///
    /// Indicators are fed unconditionally; a cooling-down pattern still
    /// keeps its market current. Returns `None` on a quiet tick, a failed
    /// condition, or a lost cooldown race.
    pub async fn detect_pattern(
        &mut self,
        pattern: PatternType,
        trade: &Trade,
        now: DateTime<Utc>,
        context: &mut MarketDataContext,
    ) -> Result<Option<Signal>> {
        validate_trade(trade)?;
        self.ingest(trade, context);

        let cooldown = { self.config.read().await.cooldown(pattern) };
        if !self
            .cooldowns
            .is_eligible(&trade.market, pattern, cooldown, now)
        {
            return Ok(None);
        }

        // Threshold copies are taken atomically under the config lock
        let snapshot = {
            let config = self.config.read().await;
            DetectionSnapshot::capture(trade, context, &self.registry, &config, now)
        };

        let offloadable = context.total_samples() > self.settings.offload_threshold;
        let (detection, divergence) = match (&self.pool, offloadable) {
            (Some(pool), true) => match pool.evaluate(pattern, snapshot.clone()).await {
                // Reduced path: thresholds only, no divergence adjustment
                Ok(outcome) => (outcome, None),
                Err(err) => {
                    worker::log_fallback(&trade.market, pattern, &err);
                    self.evaluate_sync(pattern, &snapshot, context, now)
                }
            },
            _ => self.evaluate_sync(pattern, &snapshot, context, now),
        };

        let Some(detection) = detection else {
            return Ok(None);
        };

        let confidence = adjust_confidence(
            detection.confidence,
            divergence.as_ref(),
            detection.details.is_bullish(),
        );

        // Atomic check-and-set; a concurrent tick may have won the slot
        if !self
            .cooldowns
            .try_record(&trade.market, pattern, cooldown, now)
        {
            debug!(market = %trade.market, %pattern, "detection lost the cooldown race");
            return Ok(None);
        }

        debug!(
            market = %trade.market,
            %pattern,
            confidence,
            change_pct = snapshot.features.change_pct,
            "pattern detected"
        );

        Ok(Some(Signal {
            id: Uuid::new_v4(),
            market: trade.market.clone(),
            pattern,
            price: trade.price,
            change_pct: snapshot.features.change_pct,
            volume: trade.volume,
            amount: trade.total(),
            detected_at: now,
            confidence,
            divergence,
            details: detection.details,
        }))
    }

    /// Full in-process evaluation: handler plus divergence
    fn evaluate_sync(
        &self,
        pattern: PatternType,
        snapshot: &DetectionSnapshot,
        context: &MarketDataContext,
        now: DateTime<Utc>,
    ) -> (Option<Detection>, Option<DivergenceInfo>) {
        let detection = handlers::evaluate(pattern, snapshot);
        if detection.is_none() {
            return (None, None);
        }
        let divergence =
            self.registry
                .divergence(&snapshot.trade.market, context.shortest_price_window(), now);
        (detection, divergence)
    }

    // ---- diagnostics surface -------------------------------------------

    pub fn indicator_health(&self, market: &str, now: DateTime<Utc>) -> Option<IndicatorHealth> {
        self.registry.health(market, now)
    }

    pub fn all_indicator_health(&self, now: DateTime<Utc>) -> Vec<IndicatorHealth> {
        self.registry.all_health(now)
    }

    pub async fn active_cooldowns(&self, now: DateTime<Utc>) -> Vec<ActiveCooldown> {
        let config = self.config.read().await;
        self.cooldowns.active(|p| config.cooldown(p), now)
    }

    pub fn data_quality(
        &self,
        context: &MarketDataContext,
        now: DateTime<Utc>,
    ) -> DataQualityReport {
        context.data_quality(Some(&self.registry), now)
    }

    /// Evict markets idle beyond `retention` from the registry and prune
    /// long-expired cooldown entries
    pub fn cleanup_idle(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let removed = self.registry.cleanup_idle(now, retention);
        self.cooldowns.prune(retention, now);
        self.ingested.retain(|market, _| {
            self.registry.health(market, now).is_some()
        });
        removed
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }
}

/// Reject trades the windows could not digest
fn validate_trade(trade: &Trade) -> Result<()> {
    use rust_decimal::Decimal;
    if trade.market.is_empty() {
        return Err(TickflowError::InvalidTrade {
            market: trade.market.clone(),
            price: trade.price,
            reason: "empty market identifier".to_string(),
        });
    }
    if trade.price <= Decimal::ZERO {
        return Err(TickflowError::InvalidTrade {
            market: trade.market.clone(),
            price: trade.price,
            reason: "price must be positive".to_string(),
        });
    }
    if trade.volume < Decimal::ZERO {
        return Err(TickflowError::InvalidTrade {
            market: trade.market.clone(),
            price: trade.price,
            reason: "volume must not be negative".to_string(),
        });
    }
    Ok(())
}

/// Fold an observed divergence into a handler's base confidence
///
/// A divergence pointing the same way as the signal scales confidence up
/// by at most 1.5x of the original; one pointing against it scales down
/// to a 0.3x floor. The result always stays in [0, 1].
fn adjust_confidence(base: f64, divergence: Option<&DivergenceInfo>, signal_bullish: bool) -> f64 {
    let Some(info) = divergence else {
        return base.clamp(0.0, 1.0);
    };
    let strength = info.strength.clamp(0.0, 1.0);
    let agrees = signal_bullish == (info.direction == DivergenceDirection::Bullish);
    let factor = if agrees {
        (1.0 + 0.5 * strength).min(1.5)
    } else {
        (1.0 - 0.7 * strength).max(0.3)
    };
    (base * factor).clamp(0.0, 1.0)
}
