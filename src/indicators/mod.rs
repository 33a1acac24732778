pub mod custom;
pub mod divergence;
pub mod macd;
pub mod registry;
pub mod rsi;

pub use custom::*;
pub use divergence::detect_divergence;
pub use macd::{MacdSnapshot, OnlineMacd};
pub use registry::{IndicatorHealth, IndicatorSettings, MacdReading, MetricsRegistry, RsiReading};
pub use rsi::OnlineRsi;
