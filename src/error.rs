use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the signal engine
#[derive(Error, Debug)]
pub enum TickflowError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid context layout: {0}")]
    ContextLayout(String),

    // Threshold mutation errors
    #[error("Invalid threshold for {pattern}.{key}: {value} ({reason})")]
    InvalidThreshold {
        pattern: String,
        key: String,
        value: f64,
        reason: String,
    },

    #[error("Unknown threshold key {key} for pattern {pattern}")]
    UnknownThreshold { pattern: String, key: String },

    #[error("Unsupported config document version: {0}")]
    UnsupportedVersion(u32),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Invalid trade: {reason} (market {market}, price {price})")]
    InvalidTrade {
        market: String,
        price: Decimal,
        reason: String,
    },

    // Worker offload errors (internal; detect_pattern never surfaces these)
    #[error("Worker pool unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Worker reply timed out after {0} ms")]
    WorkerTimeout(u64),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TickflowError
pub type Result<T> = std::result::Result<T, TickflowError>;
