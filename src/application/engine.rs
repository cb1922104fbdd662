//! Mean-Reversion Engine
//!
//! Folds one series through the estimator, detector and criterion leaves and
//! tracks every deviation episode from opening to a terminal status.
//!
//! Per bar:
//! 1. Update the estimators, unless frozen by an active event
//! 2. Skip until warm-up is over and both estimators are ready
//! 3. Compute the z-score, skipping non-finite values
//! 4. Resolve active events, reversion before failure
//! 5. Open a new event if capacity permits and the detector fires
//!
//! Events still active at series end expire on the last bar.

use crate::config::{DataConfig, EngineConfig, MrConfig};
use crate::domain::{
    BarSnapshot, DeviationEvent, EventStatus, ScoreOptions, ScoreResult, SeriesView,
    VolatilityUnit,
};
use crate::error::{MrError, Result};
use crate::strategy::{zscore, Leaves};

/// Which estimators skip their update on the current bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freeze {
    pub mean: bool,
    pub volatility: bool,
}

impl Freeze {
    /// Freeze flags for a bar, given whether a deviation is in progress
    pub fn for_bar(engine: &EngineConfig, deviation_active: bool) -> Self {
        Self {
            mean: engine.freeze_mean_on_event && deviation_active,
            volatility: engine.freeze_volatility_on_event && deviation_active,
        }
    }
}

/// Estimates on a bar that passed the readiness gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStats {
    pub mean: f64,
    pub volatility: f64,
    pub zscore: f64,
}

/// Advance the estimators by one bar and return the bar's statistics once
/// warm-up and readiness allow it.
///
/// `volatility_input` is None when the volatility estimator has nothing to
/// consume on this bar (bar 0 in returns units).
pub fn advance_estimators(
    leaves: &mut Leaves,
    index: usize,
    value: f64,
    volatility_input: Option<f64>,
    freeze: Freeze,
    min_bars_required: usize,
) -> Option<BarStats> {
    if !freeze.mean {
        leaves.mean.update(value);
    }
    if !freeze.volatility {
        if let Some(x) = volatility_input {
            leaves.volatility.update(x);
        }
    }

    if index + 1 < min_bars_required {
        return None;
    }
    if !(leaves.mean.is_ready() && leaves.volatility.is_ready()) {
        return None;
    }

    let mean = leaves.mean.value();
    let volatility = leaves.volatility.value();
    let z = zscore(value, mean, volatility)?;
    Some(BarStats {
        mean,
        volatility,
        zscore: z,
    })
}

/// Volatility estimator input for bar `index`
pub(crate) fn volatility_input(
    unit: VolatilityUnit,
    values: &[f64],
    returns: Option<&[f64]>,
    index: usize,
) -> Option<f64> {
    match unit {
        VolatilityUnit::Price => values.get(index).copied(),
        VolatilityUnit::Returns => index
            .checked_sub(1)
            .and_then(|prev| returns.and_then(|r| r.get(prev).copied())),
    }
}

/// Streaming deviation detector and scorer for a single series
#[derive(Debug)]
pub struct MeanReversionEngine {
    leaves: Leaves,
    engine: EngineConfig,
    data: DataConfig,
    options: ScoreOptions,
}

impl MeanReversionEngine {
    pub fn new(
        leaves: Leaves,
        engine: EngineConfig,
        data: DataConfig,
        options: ScoreOptions,
    ) -> Result<Self> {
        if engine.max_active_events < 1 {
            return Err(MrError::config("max_active_events must be >= 1"));
        }
        Ok(Self {
            leaves,
            engine,
            data,
            options,
        })
    }

    /// Build the engine described by a configuration document
    pub fn from_config(config: &MrConfig) -> Result<Self> {
        Self::new(
            config.build_leaves()?,
            config.engine.clone(),
            config.data.clone(),
            config.score_options(),
        )
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Score a series: closed events folded into an aggregate result
    pub fn run(&mut self, series: SeriesView<'_>) -> Result<ScoreResult> {
        let events = self.run_events(series)?;
        let result = ScoreResult::from_events(events, self.options);
        tracing::debug!(
            "Scored {} bars: {} events, {} reverted, score {:.4}",
            series.len(),
            result.total_events,
            result.reverted_events,
            result.score
        );
        Ok(result)
    }

    /// Run the state machine and return every event, all in a terminal status
    ///
    /// Estimator state is reset first, so consecutive runs are independent.
    pub fn run_events(&mut self, series: SeriesView<'_>) -> Result<Vec<DeviationEvent>> {
        series.validate()?;
        if self.data.volatility_unit == VolatilityUnit::Returns && series.returns.is_none() {
            return Err(MrError::data(
                "volatility_unit is 'returns' but the series carries no returns",
            ));
        }

        self.leaves.reset();
        let mut events: Vec<DeviationEvent> = Vec::new();
        let mut active: Vec<usize> = Vec::new();

        for (index, &value) in series.values.iter().enumerate() {
            let freeze = Freeze::for_bar(&self.engine, !active.is_empty());
            let input = volatility_input(
                self.data.volatility_unit,
                series.values,
                series.returns,
                index,
            );
            let Some(stats) = advance_estimators(
                &mut self.leaves,
                index,
                value,
                input,
                freeze,
                self.data.min_bars_required,
            ) else {
                continue;
            };
            let z = stats.zscore;

            // Resolve active events, oldest first
            let mut still_active = Vec::with_capacity(active.len());
            for &slot in &active {
                let event = &mut events[slot];
                event.observe(z);
                let status = if self.leaves.reversion.is_reverted(z) {
                    Some(EventStatus::Reverted)
                } else if self.leaves.failure.is_failed(event.bars_alive(index), z) {
                    Some(EventStatus::Failed)
                } else {
                    None
                };
                match status {
                    Some(status) => {
                        event.close(status, index, series.time(index))?;
                        tracing::debug!("Closed event: {}", event);
                    }
                    None => still_active.push(slot),
                }
            }
            active = still_active;

            let has_capacity = active.len() < self.engine.max_active_events
                && (self.engine.allow_overlapping_events || active.is_empty());
            if !has_capacity {
                continue;
            }
            if let Some(direction) =
                self.leaves
                    .detector
                    .detect(value, stats.mean, stats.volatility)
            {
                let snapshot = BarSnapshot {
                    index,
                    value,
                    mean: stats.mean,
                    volatility: stats.volatility,
                    zscore: z,
                };
                let event = DeviationEvent::open(direction, snapshot, series.time(index));
                tracing::debug!("Opened event: {}", event);
                active.push(events.len());
                events.push(event);
            }
        }

        let last = series.len() - 1;
        for slot in active {
            let event = &mut events[slot];
            event.close(EventStatus::Expired, last, series.time(last))?;
            tracing::debug!("Expired event: {}", event);
        }

        Ok(events)
    }
}
