//! Stealth in: quiet steady accumulation at stable prices

use crate::domain::{PatternDetails, PatternType};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

/// Minimum price stability (1 - cv) for an accumulation to count as quiet
const STABILITY_BAR: f64 = 0.98;

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::StealthIn;
    let f = &snap.features;

    let min_buy_ratio = snap.threshold(pattern, "buy_ratio_min");
    let min_amount = snap.threshold(pattern, "min_trade_amount");
    let min_count = snap.threshold(pattern, "min_trade_count");
    let max_interval_var = snap.threshold(pattern, "interval_variance_max");
    let band_low = snap.threshold(pattern, "rsi_band_low");
    let band_high = snap.threshold(pattern, "rsi_band_high");

    if f.stability < STABILITY_BAR || f.price_z.abs() > 1.0 {
        return None;
    }
    if f.buy_ratio < min_buy_ratio
        || f.window_volume < min_amount
        || (f.trade_count as f64) < min_count
    {
        return None;
    }
    // Accumulation shows as a metronome, not as bursts
    if f.interval_variance > max_interval_var {
        return None;
    }
    if !f.rsi.is_default && !(band_low..=band_high).contains(&f.rsi.value) {
        return None;
    }

    let confidence = (0.55
        + 0.25 * headroom(f.buy_ratio, min_buy_ratio)
        + 0.20 * headroom(f.trade_count as f64, min_count))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::StealthIn {
            stability: f.stability,
            buy_ratio: f.buy_ratio,
            interval_variance: f.interval_variance,
            trade_count: f.trade_count,
        },
    })
}
