//! Rotation Backtester
//!
//! Holds exactly one of {numerator basket, denominator basket} and rotates
//! the whole position when the deviation direction flips:
//! - UP (signal below its mean) -> hold the numerator
//! - DOWN (signal above its mean) -> hold the denominator
//! - no deviation -> keep the current leg, numerator if nothing is held
//!
//! Estimator freezing follows the engine: a deviation episode opens when the
//! detector fires and stays open until the reversion or failure criterion
//! closes it.
//!
//! Costs are `commission_bps + slippage_bps` of traded notional per side.
//! Any open holding is liquidated on the last bar as an expired trade.

use crate::config::{BacktestConfig, DataConfig, EngineConfig, MrConfig};
use crate::domain::{
    compute_signal_returns_into, BacktestResult, EquityPoint, Leg, Portfolio, Trade, TradeStatus,
    VolatilityUnit,
};
use crate::error::{MrError, Result};
use crate::strategy::Leaves;

use super::engine::{advance_estimators, volatility_input, Freeze};

/// Per-job inputs: the signal that drives the detector and the two leg
/// price series that are actually traded
#[derive(Debug, Clone, Copy)]
pub struct BacktestInput<'a> {
    pub signal: &'a [f64],
    pub numerator: &'a [f64],
    pub denominator: &'a [f64],
    /// Precomputed signal returns; derived on the fly when absent
    pub returns: Option<&'a [f64]>,
    pub times: Option<&'a [String]>,
}

impl<'a> BacktestInput<'a> {
    pub fn new(signal: &'a [f64], numerator: &'a [f64], denominator: &'a [f64]) -> Self {
        Self {
            signal,
            numerator,
            denominator,
            returns: None,
            times: None,
        }
    }

    pub fn with_returns(mut self, returns: &'a [f64]) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn with_times(mut self, times: &'a [String]) -> Self {
        self.times = Some(times);
        self
    }

    fn validate(&self) -> Result<()> {
        let n = self.signal.len();
        if n == 0 {
            return Err(MrError::data("backtest signal is empty"));
        }
        if self.numerator.len() != n || self.denominator.len() != n {
            return Err(MrError::data(format!(
                "leg lengths {}/{} do not match signal length {}",
                self.numerator.len(),
                self.denominator.len(),
                n
            )));
        }
        if let Some(times) = self.times {
            if times.len() != n {
                return Err(MrError::data(format!(
                    "times length {} does not match signal length {}",
                    times.len(),
                    n
                )));
            }
        }
        if let Some(returns) = self.returns {
            if returns.len() != n - 1 {
                return Err(MrError::data(format!(
                    "returns length {} must be signal length - 1 ({})",
                    returns.len(),
                    n - 1
                )));
            }
        }
        Ok(())
    }
}

/// Single-position rotation simulator
#[derive(Debug)]
pub struct RotationBacktester {
    leaves: Leaves,
    engine: EngineConfig,
    data: DataConfig,
    config: BacktestConfig,
    returns_buf: Vec<f64>,
}

impl RotationBacktester {
    pub fn new(
        leaves: Leaves,
        engine: EngineConfig,
        data: DataConfig,
        config: BacktestConfig,
    ) -> Result<Self> {
        if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
            return Err(MrError::config(format!(
                "initial_cash must be > 0, got {}",
                config.initial_cash
            )));
        }
        if !(config.costs.rate().is_finite() && config.costs.rate() >= 0.0) {
            return Err(MrError::config("transaction costs must be >= 0"));
        }
        Ok(Self {
            leaves,
            engine,
            data,
            config,
            returns_buf: Vec::new(),
        })
    }

    /// Build from a configuration document with a `[backtest]` section
    pub fn from_config(config: &MrConfig) -> Result<Self> {
        let backtest = config
            .backtest
            .clone()
            .ok_or_else(|| MrError::config("configuration has no [backtest] section"))?;
        Self::new(
            config.build_leaves()?,
            config.engine.clone(),
            config.data.clone(),
            backtest,
        )
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(&mut self, job_id: &str, input: BacktestInput<'_>) -> Result<BacktestResult> {
        input.validate()?;

        let mut returns_buf = std::mem::take(&mut self.returns_buf);
        let returns = match (self.data.volatility_unit, input.returns) {
            (VolatilityUnit::Returns, None) => {
                compute_signal_returns_into(
                    input.signal,
                    self.config.signal_series(),
                    self.data.returns_mode,
                    &mut returns_buf,
                )?;
                Some(returns_buf.as_slice())
            }
            (_, given) => given,
        };
        let result = self.simulate(job_id, input, returns);
        self.returns_buf = returns_buf;
        result
    }

    fn simulate(
        &mut self,
        job_id: &str,
        input: BacktestInput<'_>,
        returns: Option<&[f64]>,
    ) -> Result<BacktestResult> {
        self.leaves.reset();
        let initial_cash = self.config.initial_cash;
        let store_trades = self.config.output.store_trades;
        let store_curve = self.config.output.store_equity_curve;

        let mut portfolio = Portfolio::new(job_id, initial_cash, self.config.costs.rate());
        let mut trades: Vec<Trade> = Vec::new();
        let mut trade_count = 0usize;
        let mut curve: Vec<EquityPoint> = Vec::new();
        let mut peak = initial_cash;
        let mut max_drawdown = 0.0f64;
        // start index of the open deviation episode
        let mut episode: Option<usize> = None;

        let time = |i: usize| input.times.and_then(|t| t.get(i).cloned());

        for (index, &value) in input.signal.iter().enumerate() {
            let (num, den) = (input.numerator[index], input.denominator[index]);
            check_price(job_id, index, "numerator", num)?;
            check_price(job_id, index, "denominator", den)?;

            let freeze = Freeze::for_bar(&self.engine, episode.is_some());
            let vol_in = volatility_input(self.data.volatility_unit, input.signal, returns, index);
            let stats = advance_estimators(
                &mut self.leaves,
                index,
                value,
                vol_in,
                freeze,
                self.data.min_bars_required,
            );

            if let Some(stats) = stats {
                let z = stats.zscore;
                if let Some(start) = episode {
                    let bars_alive = index - start + 1;
                    if self.leaves.reversion.is_reverted(z)
                        || self.leaves.failure.is_failed(bars_alive, z)
                    {
                        episode = None;
                    }
                }

                let direction = self.leaves.detector.detect(value, stats.mean, stats.volatility);
                if episode.is_none() && direction.is_some() {
                    episode = Some(index);
                }
                let target = direction
                    .map(Leg::for_direction)
                    .or(portfolio.held_leg())
                    .unwrap_or(Leg::Numerator);

                match portfolio.held_leg() {
                    None => portfolio.buy(target, direction, index, time(index), num, den)?,
                    Some(held) if held != target => {
                        if let Some(trade) =
                            portfolio.sell(index, time(index), num, den, TradeStatus::Closed)
                        {
                            tracing::debug!("Rotated {} -> {}: {}", held, target, trade);
                            trade_count += 1;
                            if store_trades {
                                trades.push(trade);
                            }
                        }
                        portfolio.buy(target, direction, index, time(index), num, den)?;
                    }
                    Some(_) => {}
                }
            }

            let equity = portfolio.equity(num, den);
            peak = peak.max(equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.max((peak - equity) / peak);
            }
            if store_curve {
                curve.push(EquityPoint {
                    index,
                    time: time(index),
                    equity,
                });
            }
        }

        let last = input.signal.len() - 1;
        if let Some(trade) = portfolio.sell(
            last,
            time(last),
            input.numerator[last],
            input.denominator[last],
            TradeStatus::Expired,
        ) {
            tracing::debug!("Liquidated at series end: {}", trade);
            trade_count += 1;
            if store_trades {
                trades.push(trade);
            }
        }

        let final_equity = portfolio.cash();
        if store_curve {
            if let Some(point) = curve.last_mut() {
                point.equity = final_equity;
            }
        }
        let total_return = final_equity / initial_cash - 1.0;
        tracing::debug!(
            "Backtest {}: {} trades, final equity {:.2}, return {:.4}",
            job_id,
            trade_count,
            final_equity,
            total_return
        );

        Ok(BacktestResult {
            job_id: job_id.to_string(),
            initial_cash,
            final_equity,
            total_return,
            trade_count,
            max_drawdown,
            trades: store_trades.then_some(trades),
            equity_curve: store_curve.then_some(curve),
        })
    }
}

fn check_price(job_id: &str, index: usize, leg: &str, price: f64) -> Result<()> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(MrError::data(format!(
            "job {}: {} price at bar {} must be finite and > 0, got {}",
            job_id, leg, index, price
        )))
    }
}
