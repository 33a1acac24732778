//! Surge: sharp directional price move with volume confirmation

use crate::domain::{PatternDetails, PatternType};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::Surge;
    let f = &snap.features;

    let min_change = snap.threshold(pattern, "price_change_pct");
    let min_z = snap.threshold(pattern, "z_score_threshold");
    let min_amount = snap.threshold(pattern, "min_trade_amount");
    let hist_floor = snap.threshold(pattern, "macd_hist_floor");
    let overbought = snap.threshold(pattern, "rsi_overbought");
    let oversold = snap.threshold(pattern, "rsi_oversold");

    if f.change_pct.abs() < min_change
        || f.price_z.abs() < min_z
        || f.window_volume < min_amount
    {
        return None;
    }

    // MACD momentum must confirm the move when the calculator is live
    let histogram = f.macd.snapshot.histogram;
    if !f.macd.is_default && histogram.abs() < hist_floor {
        return None;
    }

    // No chasing an already-exhausted move
    if !f.rsi.is_default {
        let upward = f.change_pct >= 0.0;
        if (upward && f.rsi.value >= overbought) || (!upward && f.rsi.value <= oversold) {
            return None;
        }
    }

    let confidence = (0.55
        + 0.25 * headroom(f.price_z.abs(), min_z)
        + 0.20 * headroom(f.change_pct.abs(), min_change))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::Surge {
            z_score: if f.change_pct >= 0.0 {
                f.price_z.abs()
            } else {
                -f.price_z.abs()
            },
            window_volume: f.window_volume,
            macd_histogram: histogram,
            rsi: f.rsi.value,
        },
    })
}
