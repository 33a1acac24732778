//! Rebound shot: bounce from a recent low

use crate::domain::{PatternDetails, PatternType, ReboundTrigger};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::ReboundShot;
    let f = &snap.features;

    let min_range = snap.threshold(pattern, "price_range_min");
    let min_volume = snap.threshold(pattern, "min_volume");
    let oversold = snap.threshold(pattern, "rsi_oversold");

    if f.range_pct < min_range || f.jump_score <= 0.0 || f.window_volume < min_volume {
        return None;
    }

    // Either an oversold tape already lifting off the low, or a MACD cross
    let trigger = if !f.rsi.is_default && f.rsi.value <= oversold && f.range_position > 0.0 {
        ReboundTrigger::OversoldRebound
    } else if !f.macd.is_default && f.macd.bullish_cross {
        ReboundTrigger::MacdCross
    } else {
        return None;
    };

    let confidence = (0.55
        + 0.25 * headroom(f.range_pct, min_range)
        + 0.20 * f.range_position.clamp(0.0, 1.0))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::ReboundShot {
            range_pct: f.range_pct,
            jump_score: f.jump_score,
            trigger,
        },
    })
}
