//! Flash fire: aggressive buy-side volume burst

use crate::domain::{PatternDetails, PatternType};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::FlashFire;
    let f = &snap.features;

    let min_volume_z = snap.threshold(pattern, "volume_z_threshold");
    let min_amount = snap.threshold(pattern, "min_trade_amount");
    let min_buy_ratio = snap.threshold(pattern, "buy_ratio_min");
    let band_low = snap.threshold(pattern, "rsi_band_low");
    let band_high = snap.threshold(pattern, "rsi_band_high");
    let min_burst = snap.threshold(pattern, "burst_threshold");
    let min_rush = snap.threshold(pattern, "rush_threshold");

    if f.volume_z < min_volume_z
        || f.window_volume < min_amount
        || f.buy_ratio < min_buy_ratio
        || f.burst_score < min_burst
        || f.rush_score < min_rush
    {
        return None;
    }

    // A burst into an already stretched RSI is a different animal
    if !f.rsi.is_default && !(band_low..=band_high).contains(&f.rsi.value) {
        return None;
    }

    let confidence = (0.55
        + 0.25 * headroom(f.volume_z, min_volume_z)
        + 0.20 * headroom(f.buy_ratio, min_buy_ratio))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::FlashFire {
            volume_z: f.volume_z,
            buy_ratio: f.buy_ratio,
            burst_score: f.burst_score,
            rush_score: f.rush_score,
        },
    })
}
