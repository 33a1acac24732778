//! End-to-end surge detection over a realistic tick feed
//!
//! Feeds ~15 minutes of flat baseline followed by a 61-tick accelerating
//! climb of 0.6% and checks the full detect path: signal emission, the
//! attribute bag, and cooldown exclusivity for the trade that follows.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tickflow::{
    EngineConfig, MarketDataContext, PatternConfig, PatternDetector, PatternType, Trade,
    TradeSide, TickflowError,
};

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

fn trade(market: &str, price: f64, offset_secs: i64, seq: u64) -> Trade {
    Trade {
        market: market.to_string(),
        price: Decimal::try_from(price).unwrap(),
        volume: dec!(1),
        side: TradeSide::Buy,
        timestamp: ts(offset_secs),
        seq,
    }
}

/// Flat baseline for 840 s, then 60 accelerating sawtooth steps netting
/// +0.6% over the final minute. 61 ticks land inside the short window.
fn surge_feed(market: &str) -> Vec<Trade> {
    let mut feed = Vec::new();
    for t in 0..840i64 {
        let price = if t % 2 == 0 { 10_001.0 } else { 9_999.0 };
        feed.push(trade(market, price, t, t as u64));
    }
    feed.push(trade(market, 10_000.0, 840, 840));

    let mut price = 10_000.0;
    let mut t = 841i64;
    for j in 0..30 {
        let gain = 1.0 + j as f64 * 6.0 / 29.0;
        for step in [gain, -gain / 2.0] {
            price += step;
            feed.push(trade(market, price, t, t as u64));
            t += 1;
        }
    }
    feed
}

fn engine() -> (PatternDetector, MarketDataContext) {
    let config = EngineConfig::default();
    let detector = PatternDetector::new(config.indicators.settings(), PatternConfig::new());
    let context = MarketDataContext::new(
        "btc-updown",
        &config.windows.timeframes(),
        config.windows.aux_span(),
    )
    .unwrap();
    (detector, context)
}

#[tokio::test]
async fn surge_feed_emits_one_signal_with_expected_change() {
    let (mut detector, mut context) = engine();
    detector
        .config_handle()
        .write()
        .await
        .update_pattern_config(PatternType::Surge, "price_change_pct", 0.6)
        .unwrap();

    let feed = surge_feed("btc-updown");
    let mut signal = None;
    for t in &feed {
        let result = detector
            .detect_pattern(PatternType::Surge, t, t.timestamp, &mut context)
            .await
            .unwrap();
        if let Some(s) = result {
            signal = Some(s);
        }
    }

    let signal = signal.expect("surge should fire on the final climb");
    assert_eq!(signal.pattern, PatternType::Surge);
    assert_eq!(signal.market, "btc-updown");
    assert!(
        (signal.change_pct - 0.6).abs() < 0.05,
        "change_pct was {}",
        signal.change_pct
    );
    assert!(signal.confidence > 0.0 && signal.confidence <= 1.0);
    assert!(signal.is_bullish());
}

#[tokio::test]
async fn second_qualifying_trade_inside_cooldown_yields_none() {
    let (mut detector, mut context) = engine();

    let feed = surge_feed("btc-updown");
    let mut emitted = 0;
    for t in &feed {
        if detector
            .detect_pattern(PatternType::Surge, t, t.timestamp, &mut context)
            .await
            .unwrap()
            .is_some()
        {
            emitted += 1;
        }
    }
    assert_eq!(emitted, 1);

    // The climb keeps going one second later; conditions still hold but
    // the pattern is cooling down
    let follow_up = trade("btc-updown", 10_067.0, 901, 901);
    let result = detector
        .detect_pattern(PatternType::Surge, &follow_up, follow_up.timestamp, &mut context)
        .await
        .unwrap();
    assert!(result.is_none());

    // A different pattern on the same market is still eligible (it just
    // fails its own conditions on this tape)
    let other = detector
        .detect_pattern(PatternType::BlackHole, &follow_up, follow_up.timestamp, &mut context)
        .await
        .unwrap();
    assert!(other.is_none());

    let active = detector.active_cooldowns(ts(901)).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].pattern, PatternType::Surge);
    assert!(active[0].remaining_secs <= 300);
}

#[tokio::test]
async fn quiet_tape_yields_no_signal() {
    let (mut detector, mut context) = engine();

    for t in 0..300i64 {
        let tick = trade("btc-updown", 10_000.0, t, t as u64);
        let result = detector
            .detect_pattern(PatternType::Surge, &tick, tick.timestamp, &mut context)
            .await
            .unwrap();
        assert!(result.is_none(), "flat tape must stay silent at t={t}");
    }
}

#[tokio::test]
async fn invalid_trade_is_rejected() {
    let (mut detector, mut context) = engine();

    let mut bad = trade("btc-updown", 10_000.0, 0, 0);
    bad.price = dec!(0);
    let err = detector
        .detect_pattern(PatternType::Surge, &bad, bad.timestamp, &mut context)
        .await
        .unwrap_err();
    assert!(matches!(err, TickflowError::InvalidTrade { .. }));
}
