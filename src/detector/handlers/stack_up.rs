//! Stack up: sustained stepwise price climbing

use crate::domain::{PatternDetails, PatternType};

use super::super::snapshot::DetectionSnapshot;
use super::{headroom, Detection};

pub(super) fn evaluate(snap: &DetectionSnapshot) -> Option<Detection> {
    let pattern = PatternType::StackUp;
    let f = &snap.features;

    let min_streak = snap.threshold(pattern, "consecutive_min");
    let min_volume = snap.threshold(pattern, "min_volume");
    let min_volume_z = snap.threshold(pattern, "volume_z_threshold");
    let min_r_squared = snap.threshold(pattern, "r_squared_min");

    if (f.streak as f64) < min_streak
        || f.window_volume < min_volume
        || f.volume_z < min_volume_z
    {
        return None;
    }

    // The climb has to be an actual trend, not noise that happened to tick up
    if f.slope <= 0.0 || f.r_squared < min_r_squared {
        return None;
    }
    if !f.macd.is_default && f.macd.snapshot.histogram <= 0.0 {
        return None;
    }

    let confidence = (0.55
        + 0.25 * headroom(f.streak as f64, min_streak)
        + 0.20 * headroom(f.r_squared, min_r_squared))
    .min(1.0);

    Some(Detection {
        pattern,
        confidence,
        details: PatternDetails::StackUp {
            streak: f.streak,
            volume_z: f.volume_z,
            slope: f.slope,
            r_squared: f.r_squared,
        },
    })
}
