//! Black hole: heavy volume absorbed without price movement

use crate::domain::{PatternDetails, PatternType};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

/// MACD histogram magnitudes below this count as flat momentum
const FLAT_HISTOGRAM: f64 = 0.05;

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::BlackHole;
    let f = &snap.features;

    let min_amount = snap.threshold(pattern, "min_trade_amount");
    let max_cv = snap.threshold(pattern, "cv_threshold");
    let max_price_z = snap.threshold(pattern, "price_z_max");
    let buy_ratio_min = snap.threshold(pattern, "buy_ratio_min");
    let buy_ratio_max = snap.threshold(pattern, "buy_ratio_max");

    if f.window_volume < min_amount || f.cv > max_cv || f.price_z.abs() > max_price_z {
        return None;
    }
    // Two-sided absorption: neither side dominating the tape
    if f.buy_ratio < buy_ratio_min || f.buy_ratio > buy_ratio_max {
        return None;
    }
    let histogram = f.macd.snapshot.histogram;
    if !f.macd.is_default && histogram.abs() > FLAT_HISTOGRAM {
        return None;
    }

    let confidence = (0.55
        + 0.25 * headroom(f.window_volume, min_amount)
        + 0.20 * (1.0 - (f.cv / max_cv).clamp(0.0, 1.0)))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::BlackHole {
            cv: f.cv,
            price_z: f.price_z,
            buy_ratio: f.buy_ratio,
            macd_histogram: histogram,
        },
    })
}
