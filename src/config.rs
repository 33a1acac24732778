use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::context::Timeframe;
use crate::detector::DetectorSettings;
use crate::error::Result;
use crate::indicators::IndicatorSettings;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub windows: WindowConfig,
    pub indicators: IndicatorConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timeframe layout shared by every market context
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// Short detection window in seconds
    pub short_secs: i64,
    /// Medium confirmation window in seconds
    pub medium_secs: i64,
    /// Long baseline window in seconds
    pub long_secs: i64,
    /// Span for the buy-ratio and interval windows in seconds
    #[serde(default = "default_aux_secs")]
    pub aux_secs: i64,
}

fn default_aux_secs() -> i64 {
    300
}

impl WindowConfig {
    /// The layout handed to every new `MarketDataContext`
    pub fn timeframes(&self) -> Vec<Timeframe> {
        vec![
            Timeframe::new("short", self.short_secs),
            Timeframe::new("medium", self.medium_secs),
            Timeframe::new("long", self.long_secs),
        ]
    }

    pub fn aux_span(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.aux_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    /// RSI lookback in observations
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Stream gap beyond which calculators reset, in seconds
    pub max_gap_secs: i64,
    /// Span of the RSI track used for divergence, in seconds
    #[serde(default = "default_divergence_secs")]
    pub divergence_lookback_secs: i64,
}

fn default_divergence_secs() -> i64 {
    120
}

impl IndicatorConfig {
    pub fn settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            rsi_period: self.rsi_period,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            max_gap: chrono::Duration::seconds(self.max_gap_secs),
            divergence_lookback: chrono::Duration::seconds(self.divergence_lookback_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Buffered samples beyond which evaluation is offloaded
    pub offload_threshold: usize,
    /// Worker tasks in the offload pool
    pub worker_pool_size: usize,
    /// Worker reply timeout in milliseconds
    pub worker_timeout_ms: u64,
    /// Idle-market retention in seconds
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
}

fn default_retention_secs() -> i64 {
    3600
}

impl DetectorConfig {
    pub fn settings(&self) -> DetectorSettings {
        DetectorSettings {
            offload_threshold: self.offload_threshold,
            worker_pool_size: self.worker_pool_size,
            worker_reply_timeout: std::time::Duration::from_millis(self.worker_timeout_ms),
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("windows.short_secs", 60)?
            .set_default("windows.medium_secs", 300)?
            .set_default("windows.long_secs", 900)?
            .set_default("windows.aux_secs", 300)?
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.macd_fast", 12)?
            .set_default("indicators.macd_slow", 26)?
            .set_default("indicators.macd_signal", 9)?
            .set_default("indicators.max_gap_secs", 300)?
            .set_default("detector.offload_threshold", 5000)?
            .set_default("detector.worker_pool_size", 2)?
            .set_default("detector.worker_timeout_ms", 250)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TICKFLOW_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TICKFLOW_WINDOWS__SHORT_SECS, etc.)
            .add_source(
                Environment::with_prefix("TICKFLOW")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.windows.short_secs <= 0 {
            errors.push("windows.short_secs must be positive".to_string());
        }
        if self.windows.short_secs >= self.windows.medium_secs
            || self.windows.medium_secs >= self.windows.long_secs
        {
            errors.push("window spans must be strictly increasing".to_string());
        }
        if self.indicators.rsi_period < 2 {
            errors.push("indicators.rsi_period must be at least 2".to_string());
        }
        if self.indicators.macd_fast >= self.indicators.macd_slow {
            errors.push("indicators.macd_fast must be below macd_slow".to_string());
        }
        if self.indicators.macd_signal == 0 {
            errors.push("indicators.macd_signal must be positive".to_string());
        }
        if self.detector.worker_timeout_ms == 0 {
            errors.push("detector.worker_timeout_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: WindowConfig {
                short_secs: 60,
                medium_secs: 300,
                long_secs: 900,
                aux_secs: 300,
            },
            indicators: IndicatorConfig {
                rsi_period: 14,
                macd_fast: 12,
                macd_slow: 26,
                macd_signal: 9,
                max_gap_secs: 300,
                divergence_lookback_secs: 120,
            },
            detector: DetectorConfig {
                offload_threshold: 5000,
                worker_pool_size: 2,
                worker_timeout_ms: 250,
                retention_secs: 3600,
            },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.windows.timeframes().len(), 3);
    }

    #[test]
    fn test_validation_catches_bad_spans() {
        let mut config = EngineConfig::default();
        config.windows.medium_secs = 60;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("strictly increasing")));
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = EngineConfig::load_from("/nonexistent").unwrap();
        assert_eq!(config.indicators.rsi_period, 14);
        assert_eq!(config.detector.worker_pool_size, 2);
    }
}
