//! Engine Scenario Tests
//!
//! Pins the deviation event state machine with deterministic leaves:
//! 1. A deviation that comes back inside the band -> REVERTED
//! 2. A deviation that outlives max_duration -> FAILED
//! 3. A deviation still open at series end -> EXPIRED
//! 4. Real estimators built from config behave like the doubles

use mrscore::application::MeanReversionEngine;
use mrscore::config::{DataConfig, EngineConfig, MrConfig};
use mrscore::domain::{Direction, EmptyScore, EventStatus, ScoreOptions, SeriesInput, SeriesView};
use mrscore::ports::mocks::{ConstantMean, ConstantVolatility, NeverRevert};
use mrscore::strategy::{
    build_detector, build_failure, build_reversion, CompositeFailureParams, DetectorConfig,
    FailureConfig, Leaves, ReversionConfig, SoftBandParams, ZScoreDetectorParams,
};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Mean 0, volatility 1, threshold 1, tolerance 0.5
fn unit_leaves(max_duration: Option<usize>) -> Leaves {
    Leaves {
        mean: Box::new(ConstantMean::new(0.0)),
        volatility: Box::new(ConstantVolatility::new(1.0)),
        detector: build_detector(&DetectorConfig::ZScore(ZScoreDetectorParams {
            threshold: 1.0,
            min_abs_move: None,
        }))
        .unwrap(),
        reversion: build_reversion(&ReversionConfig::SoftBand(SoftBandParams {
            z_tolerance: 0.5,
        }))
        .unwrap(),
        failure: build_failure(&FailureConfig::Composite(CompositeFailureParams {
            max_duration,
            max_zscore: Some(10.0),
        }))
        .unwrap(),
    }
}

fn engine_with(leaves: Leaves, options: ScoreOptions) -> MeanReversionEngine {
    MeanReversionEngine::new(leaves, EngineConfig::default(), DataConfig::default(), options)
        .unwrap()
}

fn keep_events() -> ScoreOptions {
    ScoreOptions {
        store_events: true,
        breakdowns: true,
        ..ScoreOptions::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_reverted_event() {
    let mut engine = engine_with(unit_leaves(None), keep_events());
    let result = engine.run(SeriesView::new(&[0.0, 2.0, 0.2, 0.1])).unwrap();

    assert_eq!(result.total_events, 1);
    assert_eq!(result.reverted_events, 1);
    assert_eq!(result.score, 1.0);

    let events = result.events.as_ref().unwrap();
    assert_eq!(events[0].status, EventStatus::Reverted);
    assert_eq!(events[0].start_index, 1);
    assert_eq!(events[0].end_index, Some(2));
    assert_eq!(events[0].direction, Direction::Down);
    assert_eq!(result.mean_reversion_bars, Some(1.0));

    let by_direction = result.by_direction.as_ref().unwrap();
    assert!(!by_direction.is_empty());
}

#[test]
fn test_failed_after_max_duration() {
    let mut leaves = unit_leaves(Some(1));
    leaves.reversion = Box::new(NeverRevert);
    let mut engine = engine_with(leaves, keep_events());
    let result = engine.run(SeriesView::new(&[0.0, 2.0, 0.2, 0.1])).unwrap();

    let events = result.events.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, EventStatus::Failed);
    assert_eq!(events[0].duration(), Some(1));
    assert_eq!(result.failed_events, 1);
    assert_eq!(result.score, 0.0);
}

#[test]
fn test_expired_at_last_index() {
    let mut leaves = unit_leaves(None);
    leaves.reversion = Box::new(NeverRevert);
    let mut engine = engine_with(leaves, keep_events());
    let values = [0.0, -2.0, -1.5, -1.2, -1.1];
    let result = engine.run(SeriesView::new(&values)).unwrap();

    let events = result.events.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Up);
    assert_eq!(events[0].status, EventStatus::Expired);
    assert_eq!(events[0].end_index, Some(values.len() - 1));
    assert_eq!(result.expired_events, 1);
}

#[test]
fn test_excessive_zscore_fails() {
    let mut engine = engine_with(unit_leaves(None), keep_events());
    let result = engine.run(SeriesView::new(&[0.0, 2.0, 12.0])).unwrap();
    assert_eq!(result.events.unwrap()[0].status, EventStatus::Failed);
}

#[test]
fn test_empty_score_policy() {
    let options = ScoreOptions {
        empty_score: EmptyScore::Nan,
        ..ScoreOptions::default()
    };
    let mut engine = engine_with(unit_leaves(None), options);
    let result = engine.run(SeriesView::new(&[0.0, 0.1, -0.1])).unwrap();
    assert_eq!(result.total_events, 0);
    assert!(result.score.is_nan());
}

#[test]
fn test_runs_are_independent() {
    let mut engine = engine_with(unit_leaves(None), ScoreOptions::default());
    let first = engine.run(SeriesView::new(&[0.0, 2.0, 0.2, 0.1])).unwrap();
    let second = engine.run(SeriesView::new(&[0.0, 2.0, 0.2, 0.1])).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_configured_engine_on_oscillating_series() {
    let toml = r#"
[mean]
type = "windowed"
[mean.params]
window = 10

[volatility]
type = "windowed_std"
[volatility.params]
window = 10

[detector]
type = "z_score"
[detector.params]
threshold = 1.5

[diagnostics]
store_events = true
"#;
    let config = MrConfig::from_toml_str(toml).unwrap();
    let mut engine = MeanReversionEngine::from_config(&config).unwrap();

    // Quiet noise with isolated spikes that snap back on the next bar
    let mut values = Vec::new();
    for i in 0..60 {
        let base = 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 };
        values.push(if i % 15 == 14 { base + 6.0 } else { base });
    }
    let series = SeriesInput::new(values);
    let result = engine.run(series.view()).unwrap();

    assert!(result.total_events >= 1);
    let events = result.events.unwrap();
    assert!(events.iter().all(|e| e.status.is_terminal()));
    assert!(events.iter().all(|e| e.start_index >= 9));
}
