//! Universe Runner
//!
//! Sweeps every ratio job of a (k_num, k_den) universe, scores or backtests
//! each one, and keeps the best `top_k` in a bounded min-heap.
//!
//! Jobs that fail with a per-job error (insufficient equity, bad data) are
//! logged and skipped; any other error aborts the sweep.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{MrConfig, RankMetric, RankingConfig};
use crate::domain::{
    compute_signal_returns_into, BacktestResult, ReturnsMode, ScoreResult, SeriesView,
    SignalSeries, VolatilityUnit,
};
use crate::error::{MrError, Result};

use super::backtester::{BacktestInput, RotationBacktester};
use super::engine::MeanReversionEngine;
use super::universe::{LegSeries, RatioJob, RatioUniverse};

/// One entry of a ranking
#[derive(Debug, Clone, Serialize)]
pub struct RankedJob {
    pub rank: usize,
    pub key: String,
    pub label: String,
    pub job: RatioJob,
    pub metric: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtest: Option<BacktestResult>,
}

/// Outcome of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub k_num: usize,
    pub k_den: usize,
    pub metric: RankMetric,
    pub jobs_evaluated: usize,
    pub jobs_skipped: usize,
    pub top: Vec<RankedJob>,
}

/// Evaluated job competing for a top-K slot
#[derive(Debug)]
struct Candidate {
    order: usize,
    metric: f64,
    job: RatioJob,
    score: Option<ScoreResult>,
    backtest: Option<BacktestResult>,
}

// Greater is better: higher metric, then earlier job
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.metric
            .total_cmp(&other.metric)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Bounded top-K selection; the worst retained entry sits on top of the heap
struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    fn push(&mut self, candidate: Candidate) {
        if self.heap.len() == self.k {
            match self.heap.peek() {
                Some(Reverse(worst)) if candidate <= *worst => return,
                _ => {}
            }
        }
        self.heap.push(Reverse(candidate));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// Best first
    fn into_sorted(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}

/// Per-worker evaluation state with its own reuse buffers
struct Worker {
    engine: MeanReversionEngine,
    backtester: Option<RotationBacktester>,
    signal_series: SignalSeries,
    returns_mode: ReturnsMode,
    volatility_unit: VolatilityUnit,
    min_events: usize,
    signal: Vec<f64>,
    returns: Vec<f64>,
    legs: LegSeries,
}

impl Worker {
    fn new(config: &MrConfig, ranking: &RankingConfig) -> Result<Self> {
        let backtester = match ranking.metric {
            RankMetric::BacktestReturn => Some(RotationBacktester::from_config(config)?),
            RankMetric::Score => None,
        };
        Ok(Self {
            engine: MeanReversionEngine::from_config(config)?,
            backtester,
            signal_series: config
                .backtest
                .as_ref()
                .map(|b| b.signal_series())
                .unwrap_or_default(),
            returns_mode: config.data.returns_mode,
            volatility_unit: config.data.volatility_unit,
            min_events: ranking.min_events,
            signal: Vec::new(),
            returns: Vec::new(),
            legs: LegSeries::default(),
        })
    }

    /// None when the job does not qualify for ranking
    fn evaluate(
        &mut self,
        universe: &RatioUniverse,
        order: usize,
        job: &RatioJob,
    ) -> Result<Option<Candidate>> {
        universe.compute_signal_series_into(job, self.signal_series, &mut self.signal)?;

        if let Some(backtester) = self.backtester.as_mut() {
            universe.compute_leg_series_into(job, &mut self.legs)?;
            let input =
                BacktestInput::new(&self.signal, &self.legs.numerator, &self.legs.denominator);
            let result = backtester.run(&job.key(), input)?;
            return Ok(result.total_return.is_finite().then(|| Candidate {
                order,
                metric: result.total_return,
                job: *job,
                score: None,
                backtest: Some(result),
            }));
        }

        let mut view = SeriesView::new(&self.signal);
        if self.volatility_unit == VolatilityUnit::Returns {
            compute_signal_returns_into(
                &self.signal,
                self.signal_series,
                self.returns_mode,
                &mut self.returns,
            )?;
            view = view.with_returns(&self.returns);
        }
        let result = self.engine.run(view)?;
        if result.total_events < self.min_events || !result.score.is_finite() {
            return Ok(None);
        }
        Ok(Some(Candidate {
            order,
            metric: result.score,
            job: *job,
            score: Some(result),
            backtest: None,
        }))
    }
}

/// Drives ratio universes and ranks their jobs
#[derive(Debug, Clone)]
pub struct UniverseRunner {
    config: MrConfig,
    ranking: RankingConfig,
}

impl UniverseRunner {
    /// Ranking settings come from the config's `[ranking]` section, or defaults
    pub fn new(config: MrConfig) -> Result<Self> {
        let ranking = config.ranking.clone().unwrap_or_default();
        Self::with_ranking(config, ranking)
    }

    pub fn with_ranking(config: MrConfig, ranking: RankingConfig) -> Result<Self> {
        if ranking.top_k < 1 {
            return Err(MrError::config("top_k must be >= 1"));
        }
        if ranking.chunk_size < 1 {
            return Err(MrError::config("chunk_size must be >= 1"));
        }
        // fail on bad leaves before any job runs
        config.build_leaves()?;
        Ok(Self { config, ranking })
    }

    pub fn ranking(&self) -> &RankingConfig {
        &self.ranking
    }

    /// Rank by the configured metric
    pub fn rank(
        &self,
        universe: &mut RatioUniverse,
        k_num: usize,
        k_den: usize,
    ) -> Result<RankingReport> {
        self.rank_by(universe, k_num, k_den, self.ranking.metric)
    }

    /// Rank jobs by the fraction of deviation events that reverted
    pub fn rank_scores(
        &self,
        universe: &mut RatioUniverse,
        k_num: usize,
        k_den: usize,
    ) -> Result<RankingReport> {
        self.rank_by(universe, k_num, k_den, RankMetric::Score)
    }

    /// Rank jobs by rotation backtest total return
    pub fn rank_backtests(
        &self,
        universe: &mut RatioUniverse,
        k_num: usize,
        k_den: usize,
    ) -> Result<RankingReport> {
        self.rank_by(universe, k_num, k_den, RankMetric::BacktestReturn)
    }

    fn rank_by(
        &self,
        universe: &mut RatioUniverse,
        k_num: usize,
        k_den: usize,
        metric: RankMetric,
    ) -> Result<RankingReport> {
        let ranking = RankingConfig {
            metric,
            ..self.ranking.clone()
        };
        let budget = ranking.max_jobs.unwrap_or(usize::MAX);
        let mut jobs = universe.jobs(k_num, k_den)?.take(budget).enumerate();
        let universe: &RatioUniverse = universe;

        let mut top = TopK::new(ranking.top_k);
        let mut evaluated = 0usize;
        let mut skipped = 0usize;
        let mut absorb = |job: &RatioJob, outcome: Result<Option<Candidate>>| -> Result<()> {
            match outcome {
                Ok(candidate) => {
                    evaluated += 1;
                    if let Some(c) = candidate {
                        top.push(c);
                    }
                    Ok(())
                }
                Err(e) if e.is_per_job() => {
                    skipped += 1;
                    tracing::warn!("Skipping job {}: {}", job.key(), e);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        if ranking.parallel {
            loop {
                let chunk: Vec<(usize, RatioJob)> =
                    jobs.by_ref().take(ranking.chunk_size).collect();
                if chunk.is_empty() {
                    break;
                }
                let outcomes: Vec<Result<Option<Candidate>>> = chunk
                    .par_iter()
                    .map_init(
                        || Worker::new(&self.config, &ranking),
                        |worker, (order, job)| match worker {
                            Ok(w) => w.evaluate(universe, *order, job),
                            Err(e) => Err(e.clone()),
                        },
                    )
                    .collect();
                // merge in job order so ties resolve as in the sequential path
                for ((_, job), outcome) in chunk.iter().zip(outcomes) {
                    absorb(job, outcome)?;
                }
            }
        } else {
            let mut worker = Worker::new(&self.config, &ranking)?;
            for (order, job) in jobs {
                let outcome = worker.evaluate(universe, order, &job);
                absorb(&job, outcome)?;
            }
        }

        let top = top
            .into_sorted()
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                Ok(RankedJob {
                    rank: i + 1,
                    key: c.job.key(),
                    label: c.job.label(universe)?,
                    job: c.job,
                    metric: c.metric,
                    score: c.score,
                    backtest: c.backtest,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Ranked {} jobs ({} skipped) for k_num={}, k_den={}: kept top {}",
            evaluated,
            skipped,
            k_num,
            k_den,
            top.len()
        );

        Ok(RankingReport {
            k_num,
            k_den,
            metric,
            jobs_evaluated: evaluated,
            jobs_skipped: skipped,
            top,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(order: usize, metric: f64) -> Candidate {
        Candidate {
            order,
            metric,
            job: RatioJob {
                k_num: 1,
                k_den: 1,
                numerator_basket_id: order,
                denominator_basket_id: order + 1,
            },
            score: None,
            backtest: None,
        }
    }

    #[test]
    fn test_top_k_keeps_best() {
        let mut top = TopK::new(2);
        for (i, m) in [0.1, 0.9, 0.5, 0.7].into_iter().enumerate() {
            top.push(candidate(i, m));
        }
        let kept: Vec<f64> = top.into_sorted().iter().map(|c| c.metric).collect();
        assert_eq!(kept, vec![0.9, 0.7]);
    }

    #[test]
    fn test_top_k_ties_prefer_earlier_jobs() {
        let mut top = TopK::new(2);
        for i in 0..5 {
            top.push(candidate(i, 1.0));
        }
        let orders: Vec<usize> = top.into_sorted().iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let ranking = RankingConfig {
            top_k: 0,
            ..RankingConfig::default()
        };
        assert!(UniverseRunner::with_ranking(MrConfig::default(), ranking).is_err());
    }
}
