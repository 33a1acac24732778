//! Price-vs-indicator divergence detection
//!
//! Compares the sign of the price trend against the indicator trend over a
//! recent lookback. Best-effort enrichment: callers treat `None` as "no
//! divergence", never as a failure.

use crate::domain::{DivergenceDirection, DivergenceInfo};
use crate::stats::RollingWindow;

/// Minimum samples both series need before a divergence is meaningful
pub const MIN_SAMPLES: usize = 5;

/// Slopes too close to flat are noise, not a trend
const FLAT_SLOPE_EPS: f64 = 1e-9;

/// Classify a bullish/bearish divergence between price and an indicator
/// track, with a strength in [0, 1] derived from how clean both trends are
pub fn detect_divergence(
    price: &RollingWindow,
    indicator: &RollingWindow,
) -> Option<DivergenceInfo> {
    if price.len() < MIN_SAMPLES || indicator.len() < MIN_SAMPLES {
        return None;
    }

    let price_slope = price.slope();
    let indicator_slope = indicator.slope();
    if price_slope.abs() < FLAT_SLOPE_EPS || indicator_slope.abs() < FLAT_SLOPE_EPS {
        return None;
    }

    let direction = if price_slope < 0.0 && indicator_slope > 0.0 {
        DivergenceDirection::Bullish
    } else if price_slope > 0.0 && indicator_slope < 0.0 {
        DivergenceDirection::Bearish
    } else {
        return None;
    };

    // Two clean opposing trends diverge harder than two noisy ones
    let strength = (price.r_squared() * indicator.r_squared())
        .sqrt()
        .clamp(0.0, 1.0);

    Some(DivergenceInfo {
        direction,
        strength,
    })
}
