//! Worker-pool offload and its silent synchronous fallback
//!
//! The same qualifying feed must produce the same signal whether the
//! evaluation runs in-process, on a healthy worker, or falls back after
//! a worker failure; `detect_pattern` never surfaces a worker error.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tickflow::{
    DetectorSettings, EngineConfig, MarketDataContext, PatternConfig, PatternDetector,
    PatternType, Signal, Trade, TradeSide,
};

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

fn trade(price: f64, offset_secs: i64, seq: u64) -> Trade {
    Trade {
        market: "eth-updown".to_string(),
        price: Decimal::try_from(price).unwrap(),
        volume: dec!(1),
        side: TradeSide::Buy,
        timestamp: ts(offset_secs),
        seq,
    }
}

fn surge_feed() -> Vec<Trade> {
    let mut feed = Vec::new();
    for t in 0..840i64 {
        let price = if t % 2 == 0 { 10_001.0 } else { 9_999.0 };
        feed.push(trade(price, t, t as u64));
    }
    feed.push(trade(10_000.0, 840, 840));

    let mut price = 10_000.0;
    let mut t = 841i64;
    for j in 0..30 {
        let gain = 1.0 + j as f64 * 6.0 / 29.0;
        for step in [gain, -gain / 2.0] {
            price += step;
            feed.push(trade(price, t, t as u64));
            t += 1;
        }
    }
    feed
}

async fn run_feed(mut detector: PatternDetector) -> Option<Signal> {
    let config = EngineConfig::default();
    let mut context = MarketDataContext::new(
        "eth-updown",
        &config.windows.timeframes(),
        config.windows.aux_span(),
    )
    .unwrap();

    let mut signal = None;
    for t in &surge_feed() {
        let result = detector
            .detect_pattern(PatternType::Surge, t, t.timestamp, &mut context)
            .await
            .unwrap();
        if let Some(s) = result {
            signal = Some(s);
        }
    }
    signal
}

#[tokio::test]
async fn healthy_worker_pool_emits_the_same_signal() {
    let config = EngineConfig::default();
    let settings = DetectorSettings {
        // Every evaluation goes through the pool
        offload_threshold: 0,
        worker_pool_size: 2,
        worker_reply_timeout: Duration::from_millis(500),
    };
    let detector =
        PatternDetector::with_offload(config.indicators.settings(), PatternConfig::new(), settings);

    let signal = run_feed(detector).await.expect("offloaded surge should fire");
    assert_eq!(signal.pattern, PatternType::Surge);
    // Worker results skip the divergence adjustment but stay in bounds
    assert!(signal.confidence > 0.0 && signal.confidence <= 1.0);
}

#[tokio::test]
async fn worker_timeout_falls_back_to_synchronous_evaluation() {
    let config = EngineConfig::default();
    let settings = DetectorSettings {
        offload_threshold: 0,
        worker_pool_size: 1,
        // Expires before any worker can reply; every call takes the
        // fallback path
        worker_reply_timeout: Duration::from_millis(0),
    };
    let detector =
        PatternDetector::with_offload(config.indicators.settings(), PatternConfig::new(), settings);

    let signal = run_feed(detector)
        .await
        .expect("fallback path must still detect the surge");
    assert_eq!(signal.pattern, PatternType::Surge);
}

#[tokio::test]
async fn synchronous_and_offloaded_paths_agree() {
    let config = EngineConfig::default();
    let sync_detector =
        PatternDetector::new(config.indicators.settings(), PatternConfig::new());
    let offload_detector = PatternDetector::with_offload(
        config.indicators.settings(),
        PatternConfig::new(),
        DetectorSettings {
            offload_threshold: 0,
            worker_pool_size: 2,
            worker_reply_timeout: Duration::from_millis(500),
        },
    );

    let sync_signal = run_feed(sync_detector).await.expect("sync surge");
    let offload_signal = run_feed(offload_detector).await.expect("offload surge");

    assert_eq!(sync_signal.pattern, offload_signal.pattern);
    assert_eq!(sync_signal.detected_at, offload_signal.detected_at);
    assert!((sync_signal.change_pct - offload_signal.change_pct).abs() < 1e-9);
}
