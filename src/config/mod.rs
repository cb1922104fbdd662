//! Configuration Module
//!
//! Loads and validates configuration from TOML or JSON files.

pub mod loader;

pub use loader::{
    load_config, BacktestConfig, BacktestStrategy, ConfigError, CostsConfig, DataConfig,
    DiagnosticsConfig, EngineConfig, LoggingSection, MrConfig, OutputConfig, RankMetric,
    RankingConfig, RotationParams, ScoringConfig, UniverseConfig,
};
