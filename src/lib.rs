pub mod config;
pub mod context;
pub mod detector;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod patterns;
pub mod stats;

pub use config::{EngineConfig, LoggingConfig};
pub use context::{DataQualityReport, MarketDataContext, Timeframe, WindowQuality};
pub use detector::{
    ActiveCooldown, DetectionSnapshot, DetectorSettings, PatternDetector, WorkerPool,
};
pub use domain::{
    DivergenceDirection, DivergenceInfo, PatternDetails, PatternType, ReboundTrigger, Signal,
    Trade, TradeSide,
};
pub use error::{Result, TickflowError};
pub use indicators::{
    IndicatorHealth, IndicatorSettings, MacdSnapshot, MetricsRegistry, OnlineMacd, OnlineRsi,
};
pub use logging::init_logging;
pub use patterns::{PatternConfig, PatternConfigDocument, Preset};
pub use stats::RollingWindow;
