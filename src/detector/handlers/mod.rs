//! Pattern handlers: pure predicates over a `DetectionSnapshot`
//!
//! Each handler evaluates its conjunction of thresholds (always resolved
//! through the captured config, never literals) and returns a populated
//! detection only when every condition holds. Handlers never see live
//! windows, so the same code runs in-process and on the worker pool.

mod black_hole;
mod flash_fire;
mod rebound_shot;
mod stack_up;
mod stealth_in;
mod surge;

use serde::{Deserialize, Serialize};

use crate::domain::{PatternDetails, PatternType};

use super::snapshot::DetectionSnapshot;

/// A raw handler hit, before divergence adjustment and cooldown recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub pattern: PatternType,
    /// Unadjusted confidence in [0, 1]
    pub confidence: f64,
    pub details: PatternDetails,
}

/// How far `value` clears `threshold`, as a fraction of the threshold,
/// clamped to [0, 1]. Used to grade confidence above the bare pass.
fn headroom(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (value / threshold - 1.0).clamp(0.0, 1.0)
}

/// Evaluate one pattern's conditions against the snapshot
pub fn evaluate(pattern: PatternType, snap: &DetectionSnapshot) -> Option<Detection> {
    match pattern {
        PatternType::Surge => surge::evaluate(snap),
        PatternType::FlashFire => flash_fire::evaluate(snap),
        PatternType::StackUp => stack_up::evaluate(snap),
        PatternType::StealthIn => stealth_in::evaluate(snap),
        PatternType::BlackHole => black_hole::evaluate(snap),
        PatternType::ReboundShot => rebound_shot::evaluate(snap),
    }
}
