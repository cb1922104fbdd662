//! Application Layer - The run loops built on top of the leaves
//!
//! - `engine`: deviation event state machine and scoring
//! - `universe`: basket libraries, lazy ratio jobs, ratio series
//! - `backtester`: single-position rotation simulation
//! - `runner`: top-K ranking sweeps over a ratio universe

pub mod engine;
pub mod universe;
pub mod backtester;
pub mod runner;

pub use engine::{advance_estimators, BarStats, Freeze, MeanReversionEngine};
pub use universe::{
    apply_signal, basket_label, binomial, estimate_ratio_count, is_disjoint, BasketLibrary,
    JobIter, LegSeries, RatioCountEstimate, RatioJob, RatioUniverse,
};
pub use backtester::{BacktestInput, RotationBacktester};
pub use runner::{RankedJob, RankingReport, UniverseRunner};
