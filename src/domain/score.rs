//! Aggregate scoring of closed deviation events

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Max, Min, OrderStatistics};

use super::{DeviationEvent, Direction, EventStatus};

/// Score reported when no event closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyScore {
    #[default]
    Zero,
    One,
    Nan,
}

impl EmptyScore {
    pub fn value(&self) -> f64 {
        match self {
            EmptyScore::Zero => 0.0,
            EmptyScore::One => 1.0,
            EmptyScore::Nan => f64::NAN,
        }
    }
}

/// Outcome counts for a group of events
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub reverted: usize,
    pub failed: usize,
    pub expired: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, status: EventStatus) {
        self.total += 1;
        match status {
            EventStatus::Reverted => self.reverted += 1,
            EventStatus::Failed => self.failed += 1,
            EventStatus::Expired => self.expired += 1,
            EventStatus::Active => {}
        }
    }

    pub fn score(&self, empty: EmptyScore) -> f64 {
        if self.total == 0 {
            empty.value()
        } else {
            self.reverted as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionStats {
    pub direction: Direction,
    pub counts: OutcomeCounts,
    pub score: f64,
}

/// Events grouped by the volatility observed when they opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityBucketStats {
    pub bucket: usize,
    pub lower: f64,
    pub upper: f64,
    pub counts: OutcomeCounts,
    pub score: f64,
}

/// Aggregate result of one engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub total_events: usize,
    pub reverted_events: usize,
    pub failed_events: usize,
    pub expired_events: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_reversion_bars: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_direction: Option<Vec<DirectionStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_volatility_bucket: Option<Vec<VolatilityBucketStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<DeviationEvent>>,
}

/// Knobs for [`ScoreResult::from_events`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOptions {
    pub empty_score: EmptyScore,
    pub breakdowns: bool,
    pub volatility_buckets: usize,
    pub store_events: bool,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            empty_score: EmptyScore::Zero,
            breakdowns: false,
            volatility_buckets: 3,
            store_events: false,
        }
    }
}

impl ScoreResult {
    pub fn from_events(events: Vec<DeviationEvent>, options: ScoreOptions) -> Self {
        let mut counts = OutcomeCounts::default();
        let mut reverted_bars = 0usize;
        for event in &events {
            counts.record(event.status);
            if event.status == EventStatus::Reverted {
                reverted_bars += event.duration().unwrap_or(0);
            }
        }
        let mean_reversion_bars =
            (counts.reverted > 0).then(|| reverted_bars as f64 / counts.reverted as f64);

        let (by_direction, by_volatility_bucket) = if options.breakdowns {
            (
                Some(direction_breakdown(&events, options.empty_score)),
                Some(volatility_breakdown(
                    &events,
                    options.volatility_buckets,
                    options.empty_score,
                )),
            )
        } else {
            (None, None)
        };

        Self {
            score: counts.score(options.empty_score),
            total_events: counts.total,
            reverted_events: counts.reverted,
            failed_events: counts.failed,
            expired_events: counts.expired,
            mean_reversion_bars,
            by_direction,
            by_volatility_bucket,
            events: options.store_events.then_some(events),
        }
    }
}

fn direction_breakdown(events: &[DeviationEvent], empty: EmptyScore) -> Vec<DirectionStats> {
    [Direction::Up, Direction::Down]
        .into_iter()
        .map(|direction| {
            let mut counts = OutcomeCounts::default();
            for e in events.iter().filter(|e| e.direction == direction) {
                counts.record(e.status);
            }
            DirectionStats {
                direction,
                counts,
                score: counts.score(empty),
            }
        })
        .collect()
}

/// Quantile buckets over `start_volatility`
fn volatility_breakdown(
    events: &[DeviationEvent],
    buckets: usize,
    empty: EmptyScore,
) -> Vec<VolatilityBucketStats> {
    let vols: Vec<f64> = events
        .iter()
        .map(|e| e.start_volatility)
        .filter(|v| v.is_finite())
        .collect();
    if vols.is_empty() || buckets == 0 {
        return Vec::new();
    }

    let mut data = Data::new(vols);
    let mut bounds = Vec::with_capacity(buckets + 1);
    bounds.push(data.min());
    for i in 1..buckets {
        bounds.push(data.quantile(i as f64 / buckets as f64));
    }
    bounds.push(data.max());

    let mut stats: Vec<VolatilityBucketStats> = (0..buckets)
        .map(|b| VolatilityBucketStats {
            bucket: b,
            lower: bounds[b],
            upper: bounds[b + 1],
            counts: OutcomeCounts::default(),
            score: empty.value(),
        })
        .collect();

    for e in events.iter().filter(|e| e.start_volatility.is_finite()) {
        let b = bounds[1..buckets]
            .iter()
            .filter(|edge| e.start_volatility > **edge)
            .count();
        stats[b].counts.record(e.status);
    }
    for s in &mut stats {
        s.score = s.counts.score(empty);
    }
    stats
}
