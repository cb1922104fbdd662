//! Domain Layer - Value objects shared by the engine, universe and backtester
//!
//! Pure data with no algorithmic dependencies:
//! - `event`: deviation events and their one-way lifecycle
//! - `series`: series input, returns derivation
//! - `panel`: aligned multi-symbol price panel
//! - `score`: aggregate scoring of closed events
//! - `trade`: legs, trades, equity points, backtest results
//! - `portfolio`: cash plus at most one holding

pub mod event;
pub mod series;
pub mod panel;
pub mod score;
pub mod trade;
pub mod portfolio;

pub use event::{BarSnapshot, DeviationEvent, Direction, EventError, EventStatus};
pub use series::{
    compute_returns, compute_returns_into, compute_signal_returns_into, ReturnsMode, SeriesInput,
    SeriesView, SignalSeries, VolatilityUnit,
};
pub use panel::AlignedPanel;
pub use score::{
    DirectionStats, EmptyScore, OutcomeCounts, ScoreOptions, ScoreResult, VolatilityBucketStats,
};
pub use trade::{BacktestResult, EquityPoint, Leg, Trade, TradeStatus};
pub use portfolio::{Holding, Portfolio};
