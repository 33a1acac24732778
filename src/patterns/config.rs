//! Runtime threshold store for the six pattern detectors
//!
//! Every mutation is validated against a per-(pattern, key) rule before it
//! touches the store; batch updates are all-or-nothing. The store exports
//! to and imports from a versioned document for backup, restore, and A/B
//! variants.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::domain::PatternType;
use crate::error::{Result, TickflowError};

/// Current export-document version
pub const DOCUMENT_VERSION: u32 = 1;

/// Named bundles of pre-defined threshold values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Stricter thresholds, fewer signals
    Conservative,
    /// The defaults
    Balanced,
    /// Looser thresholds, more signals
    Aggressive,
}

/// Versioned, lossless serialization of a whole `PatternConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfigDocument {
    pub version: u32,
    /// pattern name -> (threshold key -> value)
    pub patterns: HashMap<String, HashMap<String, f64>>,
    /// pattern name -> cooldown seconds
    pub cooldown_secs: HashMap<String, i64>,
}

/// Inclusive validation range for one threshold key
#[derive(Debug, Clone, Copy)]
struct Rule {
    min: f64,
    max: f64,
}

impl Rule {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

fn rule_for(pattern: PatternType, key: &str) -> Option<Rule> {
    use PatternType::*;
    let rule = match (pattern, key) {
        (Surge, "price_change_pct") => Rule::new(0.05, 50.0),
        (Surge, "z_score_threshold") => Rule::new(0.5, 10.0),
        (Surge, "min_trade_amount") => Rule::new(0.0, f64::MAX),
        (Surge, "macd_hist_floor") => Rule::new(0.0, 100.0),
        (Surge, "rsi_overbought") => Rule::new(50.0, 100.0),
        (Surge, "rsi_oversold") => Rule::new(0.0, 50.0),

        (FlashFire, "volume_z_threshold") => Rule::new(0.5, 10.0),
        (FlashFire, "min_trade_amount") => Rule::new(0.0, f64::MAX),
        (FlashFire, "buy_ratio_min") => Rule::new(0.0, 1.0),
        (FlashFire, "rsi_band_low") => Rule::new(0.0, 50.0),
        (FlashFire, "rsi_band_high") => Rule::new(50.0, 100.0),
        (FlashFire, "burst_threshold") => Rule::new(0.0, 100.0),
        (FlashFire, "rush_threshold") => Rule::new(0.0, 100.0),

        (StackUp, "consecutive_min") => Rule::new(2.0, 50.0),
        (StackUp, "min_volume") => Rule::new(0.0, f64::MAX),
        (StackUp, "volume_z_threshold") => Rule::new(0.0, 10.0),
        (StackUp, "r_squared_min") => Rule::new(0.0, 1.0),

        (StealthIn, "buy_ratio_min") => Rule::new(0.0, 1.0),
        (StealthIn, "min_trade_amount") => Rule::new(0.0, f64::MAX),
        (StealthIn, "min_trade_count") => Rule::new(1.0, 10_000.0),
        (StealthIn, "interval_variance_max") => Rule::new(0.0, 1_000.0),
        (StealthIn, "rsi_band_low") => Rule::new(0.0, 50.0),
        (StealthIn, "rsi_band_high") => Rule::new(50.0, 100.0),

        (BlackHole, "min_trade_amount") => Rule::new(0.0, f64::MAX),
        (BlackHole, "cv_threshold") => Rule::new(0.0, 1.0),
        (BlackHole, "price_z_max") => Rule::new(0.0, 10.0),
        (BlackHole, "buy_ratio_min") => Rule::new(0.0, 1.0),
        (BlackHole, "buy_ratio_max") => Rule::new(0.0, 1.0),

        (ReboundShot, "price_range_min") => Rule::new(0.0, 1.0),
        (ReboundShot, "min_volume") => Rule::new(0.0, f64::MAX),
        (ReboundShot, "rsi_oversold") => Rule::new(0.0, 50.0),

        _ => return None,
    };
    Some(rule)
}

fn default_thresholds(pattern: PatternType) -> HashMap<String, f64> {
    use PatternType::*;
    let pairs: &[(&str, f64)] = match pattern {
        Surge => &[
            ("price_change_pct", 0.5),
            ("z_score_threshold", 2.0),
            ("min_trade_amount", 10_000.0),
            ("macd_hist_floor", 0.1),
            ("rsi_overbought", 75.0),
            ("rsi_oversold", 25.0),
        ],
        FlashFire => &[
            ("volume_z_threshold", 2.5),
            ("min_trade_amount", 15_000.0),
            ("buy_ratio_min", 0.65),
            ("rsi_band_low", 35.0),
            ("rsi_band_high", 65.0),
            ("burst_threshold", 1.5),
            ("rush_threshold", 0.3),
        ],
        StackUp => &[
            ("consecutive_min", 4.0),
            ("min_volume", 8_000.0),
            ("volume_z_threshold", 1.5),
            ("r_squared_min", 0.6),
        ],
        StealthIn => &[
            ("buy_ratio_min", 0.6),
            ("min_trade_amount", 5_000.0),
            ("min_trade_count", 10.0),
            ("interval_variance_max", 2.0),
            ("rsi_band_low", 35.0),
            ("rsi_band_high", 65.0),
        ],
        BlackHole => &[
            ("min_trade_amount", 20_000.0),
            ("cv_threshold", 0.02),
            ("price_z_max", 1.0),
            ("buy_ratio_min", 0.4),
            ("buy_ratio_max", 0.6),
        ],
        ReboundShot => &[
            ("price_range_min", 0.01),
            ("min_volume", 8_000.0),
            ("rsi_oversold", 30.0),
        ],
    };
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Pre-defined override values applied on top of the defaults
fn preset_overrides(preset: Preset) -> Vec<(PatternType, &'static str, f64)> {
    use PatternType::*;
    match preset {
        Preset::Balanced => Vec::new(),
        Preset::Conservative => vec![
            (Surge, "price_change_pct", 0.8),
            (Surge, "z_score_threshold", 2.5),
            (Surge, "min_trade_amount", 20_000.0),
            (FlashFire, "volume_z_threshold", 3.0),
            (FlashFire, "buy_ratio_min", 0.7),
            (StackUp, "consecutive_min", 5.0),
            (StackUp, "r_squared_min", 0.7),
            (StealthIn, "min_trade_count", 15.0),
            (BlackHole, "min_trade_amount", 35_000.0),
            (ReboundShot, "price_range_min", 0.015),
        ],
        Preset::Aggressive => vec![
            (Surge, "price_change_pct", 0.3),
            (Surge, "z_score_threshold", 1.5),
            (Surge, "min_trade_amount", 5_000.0),
            (FlashFire, "volume_z_threshold", 2.0),
            (FlashFire, "buy_ratio_min", 0.6),
            (StackUp, "consecutive_min", 3.0),
            (StackUp, "r_squared_min", 0.5),
            (StealthIn, "min_trade_count", 6.0),
            (BlackHole, "min_trade_amount", 12_000.0),
            (ReboundShot, "price_range_min", 0.007),
        ],
    }
}

fn default_cooldown_secs(pattern: PatternType) -> i64 {
    use PatternType::*;
    match pattern {
        Surge => 300,
        FlashFire => 180,
        StackUp => 300,
        StealthIn => 600,
        BlackHole => 600,
        ReboundShot => 240,
    }
}

/// Mutable, validated per-pattern threshold store
#[derive(Debug, Clone)]
pub struct PatternConfig {
    thresholds: HashMap<PatternType, HashMap<String, f64>>,
    cooldowns: HashMap<PatternType, i64>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternConfig {
    /// A store holding the balanced defaults for every pattern
    pub fn new() -> Self {
        let mut thresholds = HashMap::new();
        let mut cooldowns = HashMap::new();
        for pattern in PatternType::all() {
            thresholds.insert(pattern, default_thresholds(pattern));
            cooldowns.insert(pattern, default_cooldown_secs(pattern));
        }
        Self {
            thresholds,
            cooldowns,
        }
    }

    fn validate(&self, pattern: PatternType, key: &str, value: f64) -> Result<()> {
        let rule = rule_for(pattern, key).ok_or_else(|| TickflowError::UnknownThreshold {
            pattern: pattern.to_string(),
            key: key.to_string(),
        })?;
        if !value.is_finite() {
            return Err(TickflowError::InvalidThreshold {
                pattern: pattern.to_string(),
                key: key.to_string(),
                value,
                reason: "value must be finite".to_string(),
            });
        }
        if value < rule.min || value > rule.max {
            return Err(TickflowError::InvalidThreshold {
                pattern: pattern.to_string(),
                key: key.to_string(),
                value,
                reason: format!("allowed range is [{}, {}]", rule.min, rule.max),
            });
        }
        Ok(())
    }

    /// Read one threshold
    pub fn get(&self, pattern: PatternType, key: &str) -> Option<f64> {
        self.thresholds.get(&pattern)?.get(key).copied()
    }

    /// All thresholds for one pattern
    pub fn thresholds(&self, pattern: PatternType) -> &HashMap<String, f64> {
        // Every pattern is populated at construction
        &self.thresholds[&pattern]
    }

    /// Deep copy of one pattern's thresholds (taken for offload snapshots)
    pub fn snapshot(&self, pattern: PatternType) -> HashMap<String, f64> {
        self.thresholds[&pattern].clone()
    }

    /// Validate and set a single threshold; the store is untouched when
    /// validation fails
    pub fn update_pattern_config(
        &mut self,
        pattern: PatternType,
        key: &str,
        value: f64,
    ) -> Result<()> {
        self.validate(pattern, key, value)?;
        self.thresholds
            .get_mut(&pattern)
            .expect("all patterns populated at construction")
            .insert(key.to_string(), value);
        info!(%pattern, key, value, "pattern threshold updated");
        Ok(())
    }

    /// Validate an entire batch before applying any of it (all-or-nothing)
    pub fn update_full_pattern_config(
        &mut self,
        pattern: PatternType,
        values: &HashMap<String, f64>,
    ) -> Result<()> {
        for (key, value) in values {
            self.validate(pattern, key, *value)?;
        }
        let target = self
            .thresholds
            .get_mut(&pattern)
            .expect("all patterns populated at construction");
        for (key, value) in values {
            target.insert(key.clone(), *value);
        }
        info!(%pattern, keys = values.len(), "pattern config batch applied");
        Ok(())
    }

    /// Restore one pattern to its defaults
    pub fn reset_pattern(&mut self, pattern: PatternType) {
        self.thresholds.insert(pattern, default_thresholds(pattern));
        self.cooldowns.insert(pattern, default_cooldown_secs(pattern));
        info!(%pattern, "pattern config reset to defaults");
    }

    /// Restore every pattern to its defaults
    pub fn reset_all(&mut self) {
        *self = Self::new();
        info!("all pattern configs reset to defaults");
    }

    /// Bulk-apply a named preset on top of fresh defaults
    pub fn apply_preset(&mut self, preset: Preset) {
        *self = Self::new();
        for (pattern, key, value) in preset_overrides(preset) {
            // Preset tables are pre-validated by construction
            self.thresholds
                .get_mut(&pattern)
                .expect("all patterns populated at construction")
                .insert(key.to_string(), value);
        }
        info!(?preset, "preset applied");
    }

    /// Cooldown duration for one pattern
    pub fn cooldown(&self, pattern: PatternType) -> Duration {
        Duration::seconds(self.cooldowns[&pattern])
    }

    pub fn set_cooldown(&mut self, pattern: PatternType, duration: Duration) -> Result<()> {
        let secs = duration.num_seconds();
        if secs < 0 {
            return Err(TickflowError::InvalidThreshold {
                pattern: pattern.to_string(),
                key: "cooldown_secs".to_string(),
                value: secs as f64,
                reason: "cooldown must not be negative".to_string(),
            });
        }
        self.cooldowns.insert(pattern, secs);
        Ok(())
    }

    /// Lossless export to the versioned document form
    pub fn export(&self) -> PatternConfigDocument {
        PatternConfigDocument {
            version: DOCUMENT_VERSION,
            patterns: self
                .thresholds
                .iter()
                .map(|(p, values)| (p.to_string(), values.clone()))
                .collect(),
            cooldown_secs: self
                .cooldowns
                .iter()
                .map(|(p, secs)| (p.to_string(), *secs))
                .collect(),
        }
    }

    /// Rebuild a store from an exported document, validating every value
    pub fn from_document(doc: &PatternConfigDocument) -> Result<Self> {
        if doc.version != DOCUMENT_VERSION {
            return Err(TickflowError::UnsupportedVersion(doc.version));
        }

        let mut config = Self::new();
        for pattern in PatternType::all() {
            if let Some(values) = doc.patterns.get(pattern.as_str()) {
                config.update_full_pattern_config(pattern, values)?;
            }
            if let Some(secs) = doc.cooldown_secs.get(pattern.as_str()) {
                config.set_cooldown(pattern, Duration::seconds(*secs))?;
            }
        }
        Ok(config)
    }

    /// Deep-copy the config, scaling one key by `multiplier` (for A/B
    /// variants); the scaled value must still validate
    pub fn create_variant(
        &self,
        pattern: PatternType,
        key: &str,
        multiplier: f64,
    ) -> Result<Self> {
        let current = self
            .get(pattern, key)
            .ok_or_else(|| TickflowError::UnknownThreshold {
                pattern: pattern.to_string(),
                key: key.to_string(),
            })?;
        let mut variant = self.clone();
        variant.update_pattern_config(pattern, key, current * multiplier)?;
        Ok(variant)
    }
}
