pub mod config;

pub use config::{PatternConfig, PatternConfigDocument, Preset};
