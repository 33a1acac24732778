use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six pattern families the detector can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternType {
    /// Sharp directional price move with volume confirmation
    Surge,
    /// Aggressive buy-side volume burst
    FlashFire,
    /// Sustained stepwise price climbing
    StackUp,
    /// Quiet steady accumulation at stable prices
    StealthIn,
    /// Heavy volume absorbed without price movement
    BlackHole,
    /// Bounce from a recent low
    ReboundShot,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Surge => "surge",
            PatternType::FlashFire => "flashFire",
            PatternType::StackUp => "stackUp",
            PatternType::StealthIn => "stealthIn",
            PatternType::BlackHole => "blackHole",
            PatternType::ReboundShot => "reboundShot",
        }
    }

    pub fn all() -> [PatternType; 6] {
        [
            PatternType::Surge,
            PatternType::FlashFire,
            PatternType::StackUp,
            PatternType::StealthIn,
            PatternType::BlackHole,
            PatternType::ReboundShot,
        ]
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a price/indicator divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceDirection {
    /// Price falling while the indicator rises
    Bullish,
    /// Price rising while the indicator falls
    Bearish,
}

/// Divergence metadata attached to a signal when it was observed
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DivergenceInfo {
    pub direction: DivergenceDirection,
    /// Strength in [0, 1]
    pub strength: f64,
}

/// What triggered a rebound-shot signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReboundTrigger {
    /// Oversold RSI with price back above the recent low
    OversoldRebound,
    /// MACD line crossing above its signal line
    MacdCross,
}

/// Pattern-specific numeric fields, one typed shape per pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "camelCase")]
pub enum PatternDetails {
    Surge {
        z_score: f64,
        window_volume: f64,
        macd_histogram: f64,
        rsi: f64,
    },
    FlashFire {
        volume_z: f64,
        buy_ratio: f64,
        burst_score: f64,
        rush_score: f64,
    },
    StackUp {
        streak: usize,
        volume_z: f64,
        slope: f64,
        r_squared: f64,
    },
    StealthIn {
        stability: f64,
        buy_ratio: f64,
        interval_variance: f64,
        trade_count: usize,
    },
    BlackHole {
        cv: f64,
        price_z: f64,
        buy_ratio: f64,
        macd_histogram: f64,
    },
    ReboundShot {
        range_pct: f64,
        jump_score: f64,
        trigger: ReboundTrigger,
    },
}

impl PatternDetails {
    /// Whether the detection points in the bullish direction
    pub fn is_bullish(&self) -> bool {
        match self {
            PatternDetails::Surge { z_score, .. } => *z_score >= 0.0,
            // The remaining families all describe buy-side behavior
            _ => true,
        }
    }

    /// The pattern family this detail shape belongs to
    pub fn pattern_type(&self) -> PatternType {
        match self {
            PatternDetails::Surge { .. } => PatternType::Surge,
            PatternDetails::FlashFire { .. } => PatternType::FlashFire,
            PatternDetails::StackUp { .. } => PatternType::StackUp,
            PatternDetails::StealthIn { .. } => PatternType::StealthIn,
            PatternDetails::BlackHole { .. } => PatternType::BlackHole,
            PatternDetails::ReboundShot { .. } => PatternType::ReboundShot,
        }
    }
}

/// A detected trading signal, created only by the pattern detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal id
    pub id: Uuid,
    /// Market the signal fired on
    pub market: String,
    /// Pattern family
    pub pattern: PatternType,
    /// Price at detection time
    pub price: Decimal,
    /// Price change over the detection window, in percent
    pub change_pct: f64,
    /// Trade volume of the triggering tick
    pub volume: Decimal,
    /// Notional amount of the triggering tick
    pub amount: Decimal,
    /// When the signal was detected
    pub detected_at: DateTime<Utc>,
    /// Confidence in [0, 1], divergence-adjusted
    pub confidence: f64,
    /// Divergence observed at detection time, if any
    pub divergence: Option<DivergenceInfo>,
    /// Pattern-specific fields
    pub details: PatternDetails,
}

impl Signal {
    /// Whether the signal points in the bullish direction
    pub fn is_bullish(&self) -> bool {
        self.details.is_bullish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_round_trip() {
        for pattern in PatternType::all() {
            let json = serde_json::to_string(&pattern).unwrap();
            let back: PatternType = serde_json::from_str(&json).unwrap();
            assert_eq!(pattern, back);
        }
        assert_eq!(PatternType::FlashFire.to_string(), "flashFire");
    }

    #[test]
    fn test_details_pattern_type() {
        let details = PatternDetails::StackUp {
            streak: 4,
            volume_z: 2.0,
            slope: 0.1,
            r_squared: 0.9,
        };
        assert_eq!(details.pattern_type(), PatternType::StackUp);
    }
}
