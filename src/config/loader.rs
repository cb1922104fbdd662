//! Configuration Loader
//!
//! Loads and validates the mrscore configuration from TOML or JSON files.
//! Unknown fields are rejected everywhere, and every optional field has an
//! explicit default so that a serialized config parses back unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::{EmptyScore, ReturnsMode, ScoreOptions, SignalSeries, VolatilityUnit};
use crate::error::MrError;
use crate::strategy::{
    DetectorConfig, FailureConfig, Leaves, MeanEstimatorConfig, ReversionConfig,
    VolatilityEstimatorConfig,
};

/// Main configuration document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MrConfig {
    #[serde(default)]
    pub mean: MeanEstimatorConfig,
    #[serde(default)]
    pub volatility: VolatilityEstimatorConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub reversion: ReversionConfig,
    #[serde(default)]
    pub failure: FailureConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest: Option<BacktestConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe: Option<UniverseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankingConfig>,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Event state machine flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Open a new event while another is still active
    #[serde(default)]
    pub allow_overlapping_events: bool,
    /// Stop updating the mean while an event is active
    #[serde(default)]
    pub freeze_mean_on_event: bool,
    /// Stop updating the volatility while an event is active
    #[serde(default)]
    pub freeze_volatility_on_event: bool,
    #[serde(default = "default_max_active_events")]
    pub max_active_events: usize,
}

fn default_max_active_events() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_overlapping_events: false,
            freeze_mean_on_event: false,
            freeze_volatility_on_event: false,
            max_active_events: default_max_active_events(),
        }
    }
}

/// Input requirements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Bars to consume before any detection happens
    #[serde(default)]
    pub min_bars_required: usize,
    #[serde(default)]
    pub returns_mode: ReturnsMode,
    #[serde(default)]
    pub volatility_unit: VolatilityUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Score reported when no event closed
    #[serde(default)]
    pub empty_score: EmptyScore,
    /// Quantile buckets over event start volatility
    #[serde(default = "default_volatility_buckets")]
    pub volatility_buckets: usize,
}

fn default_volatility_buckets() -> usize {
    3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            empty_score: EmptyScore::default(),
            volatility_buckets: default_volatility_buckets(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Keep every closed event in the score result
    #[serde(default)]
    pub store_events: bool,
    /// Fill the per-direction and per-volatility-bucket breakdowns
    #[serde(default)]
    pub breakdowns: bool,
}

/// Rotation backtest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    #[serde(default)]
    pub costs: CostsConfig,
    #[serde(default)]
    pub strategy: BacktestStrategy,
    #[serde(default)]
    pub output: OutputConfig,
}

impl BacktestConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            costs: CostsConfig::default(),
            strategy: BacktestStrategy::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn signal_series(&self) -> SignalSeries {
        match &self.strategy {
            BacktestStrategy::Rotation(p) => p.signal_series,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    #[serde(default)]
    pub commission_bps: f64,
    #[serde(default)]
    pub slippage_bps: f64,
}

impl CostsConfig {
    /// Fraction of traded notional paid per side
    pub fn rate(&self) -> f64 {
        (self.commission_bps + self.slippage_bps) / 10_000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum BacktestStrategy {
    Rotation(RotationParams),
}

impl Default for BacktestStrategy {
    fn default() -> Self {
        BacktestStrategy::Rotation(RotationParams::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationParams {
    #[serde(default)]
    pub signal_series: SignalSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub store_trades: bool,
    #[serde(default)]
    pub store_equity_curve: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            store_trades: true,
            store_equity_curve: false,
        }
    }
}

/// Basket ratio generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseConfig {
    /// Divide each panel column by its first value
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// Skip pairs whose baskets share a symbol
    #[serde(default = "default_true")]
    pub disallow_overlap: bool,
    /// With equal basket sizes, yield each unordered pair once
    #[serde(default = "default_true")]
    pub unordered_if_equal_k: bool,
    /// Added to the denominator sum
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Largest C(N, k) a basket library may hold
    #[serde(default = "default_max_library_size")]
    pub max_library_size: u64,
}

fn default_epsilon() -> f64 {
    1e-12
}

fn default_max_library_size() -> u64 {
    5_000_000
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            disallow_overlap: true,
            unordered_if_equal_k: true,
            epsilon: default_epsilon(),
            max_library_size: default_max_library_size(),
        }
    }
}

/// What the universe runner ranks jobs by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Score,
    BacktestReturn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Jobs with fewer closed events are left out of score rankings
    #[serde(default = "default_min_events")]
    pub min_events: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jobs: Option<usize>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub metric: RankMetric,
}

fn default_top_k() -> usize {
    10
}

fn default_min_events() -> usize {
    1
}

fn default_chunk_size() -> usize {
    4096
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_events: default_min_events(),
            max_jobs: None,
            parallel: false,
            chunk_size: default_chunk_size(),
            metric: RankMetric::default(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<MrError> for ConfigError {
    fn from(err: MrError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

/// Load configuration from a TOML file, or JSON when the extension is `.json`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MrConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        MrConfig::from_json_str(&content)
    } else {
        MrConfig::from_toml_str(&content)
    }
}

impl MrConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MrConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: MrConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build every leaf once so parameter-domain errors surface at load time
    pub fn build_leaves(&self) -> Result<Leaves, MrError> {
        Leaves::build(
            &self.mean,
            &self.volatility,
            &self.detector,
            &self.reversion,
            &self.failure,
        )
    }

    pub fn score_options(&self) -> ScoreOptions {
        ScoreOptions {
            empty_score: self.scoring.empty_score,
            breakdowns: self.diagnostics.breakdowns,
            volatility_buckets: self.scoring.volatility_buckets,
            store_events: self.diagnostics.store_events,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_leaves()?;

        if self.engine.max_active_events < 1 {
            return Err(ConfigError::ValidationError(
                "max_active_events must be >= 1".to_string(),
            ));
        }

        if let Some(bt) = &self.backtest {
            if !(bt.initial_cash.is_finite() && bt.initial_cash > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "initial_cash must be > 0, got {}",
                    bt.initial_cash
                )));
            }
            for (name, bps) in [
                ("commission_bps", bt.costs.commission_bps),
                ("slippage_bps", bt.costs.slippage_bps),
            ] {
                if !(bps.is_finite() && bps >= 0.0) {
                    return Err(ConfigError::ValidationError(format!(
                        "{} must be >= 0, got {}",
                        name, bps
                    )));
                }
            }
        }

        if let Some(u) = &self.universe {
            if !(u.epsilon.is_finite() && u.epsilon > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "epsilon must be > 0, got {}",
                    u.epsilon
                )));
            }
            if u.max_library_size == 0 {
                return Err(ConfigError::ValidationError(
                    "max_library_size must be >= 1".to_string(),
                ));
            }
        }

        if let Some(r) = &self.ranking {
            if r.top_k < 1 {
                return Err(ConfigError::ValidationError("top_k must be >= 1".to_string()));
            }
            if r.chunk_size < 1 {
                return Err(ConfigError::ValidationError(
                    "chunk_size must be >= 1".to_string(),
                ));
            }
            if r.metric == RankMetric::BacktestReturn && self.backtest.is_none() {
                return Err(ConfigError::ValidationError(
                    "ranking by backtest_return needs a [backtest] section".to_string(),
                ));
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{GarchParams, KalmanParams};

    const SAMPLE: &str = r#"
[mean]
type = "kalman"
[mean.params]
process_var = 1e-5
obs_var = 1e-3

[volatility]
type = "garch"
[volatility.params]
omega = 1e-6
alpha = 0.1
beta = 0.85

[detector]
type = "z_score"
[detector.params]
threshold = 2.0

[reversion]
type = "soft_band"
[reversion.params]
z_tolerance = 0.5

[failure]
type = "composite"
[failure.params]
max_duration = 30

[engine]
freeze_mean_on_event = true

[data]
min_bars_required = 20
volatility_unit = "returns"
returns_mode = "log"

[backtest]
initial_cash = 10000.0
[backtest.costs]
commission_bps = 5.0
slippage_bps = 2.0
[backtest.strategy]
type = "rotation"
[backtest.strategy.params]
signal_series = "log_ratio"
"#;

    #[test]
    fn test_parse_sample() {
        let config = MrConfig::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(
            config.mean,
            MeanEstimatorConfig::Kalman(KalmanParams { init_var, .. }) if init_var == 1.0
        ));
        assert!(matches!(
            config.volatility,
            VolatilityEstimatorConfig::Garch(GarchParams { enforce_stationarity: true, .. })
        ));
        assert!(config.engine.freeze_mean_on_event);
        assert_eq!(config.engine.max_active_events, 1);
        assert_eq!(config.data.volatility_unit, VolatilityUnit::Returns);
        let bt = config.backtest.as_ref().unwrap();
        assert_eq!(bt.signal_series(), SignalSeries::LogRatio);
        assert!((bt.costs.rate() - 0.0007).abs() < 1e-15);
        assert!(bt.output.store_trades);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MrConfig::default();
        assert!(config.validate().is_ok());
        assert!(MrConfig::from_toml_str("").is_ok());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = MrConfig::from_toml_str("[bogus]\nx = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unknown_engine_field_rejected() {
        let err = MrConfig::from_toml_str("[engine]\nfreeze_everything = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_garch_non_stationary_fails_validation() {
        let toml = r#"
[volatility]
type = "garch"
[volatility.params]
omega = 1e-6
alpha = 0.3
beta = 0.7
"#;
        let err = MrConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_initial_cash_rejected() {
        let err = MrConfig::from_toml_str("[backtest]\ninitial_cash = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("initial_cash"));
    }

    #[test]
    fn test_backtest_ranking_needs_backtest() {
        let err = MrConfig::from_toml_str("[ranking]\nmetric = \"backtest_return\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_log_level() {
        let err = MrConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mr.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.data.min_bars_required, 20);

        let missing = load_config(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mr.json");
        let json = serde_json::to_string(&MrConfig::default()).unwrap();
        std::fs::write(&path, json).unwrap();
        assert_eq!(load_config(&path).unwrap(), MrConfig::default());
    }
}
