//! Rotation Backtest Invariant Tests
//!
//! Runs the rotation backtester over seeded random basket ratios and checks:
//! 1. total_return == final_equity / initial_cash - 1, exactly
//! 2. At most one leg is held at any time, and trades never overlap
//! 3. Trade accounting adds up to the final equity
//! 4. Per-job errors are skipped by ranking sweeps

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mrscore::application::{BacktestInput, RatioUniverse, RotationBacktester, UniverseRunner};
use mrscore::config::{
    BacktestConfig, BacktestStrategy, CostsConfig, MrConfig, RankMetric, RankingConfig,
    RotationParams, UniverseConfig,
};
use mrscore::domain::{AlignedPanel, Leg, SignalSeries, TradeStatus};

// ============================================================================
// Test Fixtures
// ============================================================================

fn random_panel(seed: u64, n_dates: usize, n_symbols: usize) -> AlignedPanel {
    let mut rng = StdRng::seed_from_u64(seed);
    let dates = (0..n_dates).map(|t| format!("t{}", t)).collect();
    let symbols = (0..n_symbols).map(|j| format!("S{}", j)).collect();
    let mut prices: Vec<f64> = (0..n_symbols).map(|_| rng.gen_range(5.0..50.0)).collect();
    let mut rows = Vec::with_capacity(n_dates);
    for _ in 0..n_dates {
        rows.push(prices.clone());
        for p in prices.iter_mut() {
            *p *= 1.0 + rng.gen_range(-0.05..0.05);
        }
    }
    AlignedPanel::from_rows(dates, symbols, rows).unwrap()
}

fn backtest_config(signal_series: SignalSeries) -> MrConfig {
    let toml = r#"
[mean]
type = "ewma"
[mean.params]
span = 8.0
min_periods = 8

[volatility]
type = "windowed_std"
[volatility.params]
window = 8

[detector]
type = "z_score"
[detector.params]
threshold = 1.0

[backtest]
initial_cash = 10000.0
[backtest.costs]
commission_bps = 5.0
slippage_bps = 5.0
[backtest.output]
store_trades = true
store_equity_curve = true
"#;
    let mut config = MrConfig::from_toml_str(toml).unwrap();
    if let Some(bt) = config.backtest.as_mut() {
        bt.strategy = BacktestStrategy::Rotation(RotationParams { signal_series });
    }
    config
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_total_return_identity_and_single_leg() {
    for signal_series in [SignalSeries::Ratio, SignalSeries::LogRatio] {
        let config = backtest_config(signal_series);
        let mut universe =
            RatioUniverse::new(random_panel(42, 120, 5), UniverseConfig::default()).unwrap();
        let mut backtester = RotationBacktester::from_config(&config).unwrap();

        let jobs: Vec<_> = universe.jobs(1, 2).unwrap().collect();
        assert!(!jobs.is_empty());
        for job in jobs {
            let legs = universe.compute_leg_series(&job).unwrap();
            let signal = universe.compute_signal_series(&job, signal_series).unwrap();
            let input = BacktestInput::new(&signal, &legs.numerator, &legs.denominator)
                .with_times(universe.panel().dates());
            let result = backtester.run(&job.key(), input).unwrap();

            assert_eq!(
                result.total_return,
                result.final_equity / result.initial_cash - 1.0
            );
            assert_eq!(result.job_id, job.key());

            let trades = result.trades.as_ref().unwrap();
            assert_eq!(trades.len(), result.trade_count);

            // consecutive holdings: each trade opens where the previous closed
            for pair in trades.windows(2) {
                assert_eq!(pair[0].exit_index, pair[1].entry_index);
                assert_eq!(pair[0].status, TradeStatus::Closed);
                assert_ne!(pair[0].leg, pair[1].leg);
            }
            for trade in trades {
                match trade.leg {
                    Leg::Numerator => assert_eq!(trade.qty_den, 0.0),
                    Leg::Denominator => assert_eq!(trade.qty_num, 0.0),
                }
                assert!(trade.quantity() > 0.0);
            }
            if let Some(last) = trades.last() {
                assert_eq!(last.status, TradeStatus::Expired);
                assert_eq!(last.exit_index, 119);
            }

            // each buy invests all equity; pnl chains into the final equity
            let rate = 10.0 / 10_000.0;
            let mut equity = result.initial_cash;
            for trade in trades {
                assert_relative_eq!(
                    trade.gross_notional_entry * (1.0 + rate),
                    equity,
                    max_relative = 1e-9
                );
                assert_relative_eq!(
                    trade.pnl,
                    trade.gross_notional_exit - trade.gross_notional_entry - trade.costs,
                    max_relative = 1e-9,
                    epsilon = 1e-9
                );
                equity += trade.pnl;
            }
            assert_relative_eq!(equity, result.final_equity, max_relative = 1e-9);

            let curve = result.equity_curve.as_ref().unwrap();
            assert_eq!(curve.len(), 120);
            assert_eq!(curve.last().unwrap().equity, result.final_equity);
            assert!(result.max_drawdown >= 0.0 && result.max_drawdown < 1.0);
        }
    }
}

// ============================================================================
// Sweeps
// ============================================================================

#[test]
fn test_backtest_ranking_skips_insufficient_equity() {
    let mut config = backtest_config(SignalSeries::Ratio);
    // costs so large that the investable notional underflows to zero
    config.backtest = Some(BacktestConfig {
        costs: CostsConfig {
            commission_bps: 1e300,
            slippage_bps: 0.0,
        },
        ..BacktestConfig::new(1e-300)
    });
    let ranking = RankingConfig {
        metric: RankMetric::BacktestReturn,
        ..RankingConfig::default()
    };
    let runner = UniverseRunner::with_ranking(config, ranking).unwrap();
    let mut universe = RatioUniverse::new(random_panel(3, 40, 4), UniverseConfig::default()).unwrap();
    let report = runner.rank_backtests(&mut universe, 1, 1).unwrap();
    assert_eq!(report.jobs_skipped, 6);
    assert_eq!(report.jobs_evaluated, 0);
    assert!(report.top.is_empty());
}

#[test]
fn test_ranking_by_backtest_return_orders_results() {
    let config = backtest_config(SignalSeries::LogRatio);
    let ranking = RankingConfig {
        metric: RankMetric::BacktestReturn,
        top_k: 3,
        ..RankingConfig::default()
    };
    let runner = UniverseRunner::with_ranking(config, ranking).unwrap();
    let mut universe = RatioUniverse::new(random_panel(17, 60, 5), UniverseConfig::default()).unwrap();
    let report = runner.rank(&mut universe, 1, 1).unwrap();
    assert_eq!(report.jobs_evaluated, 10);
    assert_eq!(report.top.len(), 3);
    for (i, entry) in report.top.iter().enumerate() {
        assert_eq!(entry.rank, i + 1);
        let bt = entry.backtest.as_ref().unwrap();
        assert_eq!(bt.total_return, entry.metric);
        assert!(entry.label.contains('/'));
    }
    assert!(report.top[0].metric >= report.top[2].metric);
}
