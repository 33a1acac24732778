use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an executed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, TradeSide::Buy)
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed execution on a market, produced by the ingestion layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Market identifier (e.g., "BTC-USDT")
    pub market: String,
    /// Execution price
    pub price: Decimal,
    /// Executed base volume
    pub volume: Decimal,
    /// Taker side
    pub side: TradeSide,
    /// Exchange timestamp of the execution
    pub timestamp: DateTime<Utc>,
    /// Monotonic sequence id from the feed
    pub seq: u64,
}

impl Trade {
    /// Notional value of the trade (price x volume)
    pub fn total(&self) -> Decimal {
        self.price * self.volume
    }

    /// Price as f64 for the statistics path
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    /// Volume as f64 for the statistics path
    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }

    /// Notional as f64 for the statistics path
    pub fn total_f64(&self) -> f64 {
        self.total().to_f64().unwrap_or(0.0)
    }
}
