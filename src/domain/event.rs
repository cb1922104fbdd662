//! Deviation events and their lifecycle
//!
//! An event is opened when the detector flags a deviation and is closed
//! exactly once, into one of the terminal statuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Expected direction of reversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Series is below its mean and should revert upward
    Up,
    /// Series is above its mean and should revert downward
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Lifecycle status of a deviation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Reverted,
    Failed,
    Expired,
}

impl EventStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Active)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Active => "ACTIVE",
            EventStatus::Reverted => "REVERTED",
            EventStatus::Failed => "FAILED",
            EventStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventError {
    #[error("Event already closed as {0}")]
    AlreadyClosed(EventStatus),
    #[error("Cannot close an event into the ACTIVE status")]
    NotTerminal,
    #[error("End index {end} precedes start index {start}")]
    EndBeforeStart { start: usize, end: usize },
}

/// Market snapshot taken on the bar an event opens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarSnapshot {
    pub index: usize,
    pub value: f64,
    pub mean: f64,
    pub volatility: f64,
    pub zscore: f64,
}

/// One deviation episode, from detection to resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationEvent {
    pub direction: Direction,
    pub status: EventStatus,
    pub start_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    pub start_value: f64,
    pub start_mean: f64,
    pub start_volatility: f64,
    pub start_zscore: f64,
    pub max_abs_zscore: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl DeviationEvent {
    /// Open a new ACTIVE event from the bar snapshot
    pub fn open(direction: Direction, snapshot: BarSnapshot, time: Option<String>) -> Self {
        Self {
            direction,
            status: EventStatus::Active,
            start_index: snapshot.index,
            start_time: time,
            start_value: snapshot.value,
            start_mean: snapshot.mean,
            start_volatility: snapshot.volatility,
            start_zscore: snapshot.zscore,
            max_abs_zscore: snapshot.zscore.abs(),
            end_index: None,
            end_time: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EventStatus::Active
    }

    /// Track the largest |z| seen while active
    pub fn observe(&mut self, zscore: f64) {
        if zscore.abs() > self.max_abs_zscore {
            self.max_abs_zscore = zscore.abs();
        }
    }

    /// Bars alive at `index`, counting the opening bar and `index` itself
    pub fn bars_alive(&self, index: usize) -> usize {
        index.saturating_sub(self.start_index) + 1
    }

    /// Move to a terminal status. Transitions are one-way.
    pub fn close(
        &mut self,
        status: EventStatus,
        index: usize,
        time: Option<String>,
    ) -> Result<(), EventError> {
        if self.status.is_terminal() {
            return Err(EventError::AlreadyClosed(self.status));
        }
        if !status.is_terminal() {
            return Err(EventError::NotTerminal);
        }
        if index < self.start_index {
            return Err(EventError::EndBeforeStart {
                start: self.start_index,
                end: index,
            });
        }
        self.status = status;
        self.end_index = Some(index);
        self.end_time = time;
        Ok(())
    }

    /// Bars between opening and closing; None while active
    pub fn duration(&self) -> Option<usize> {
        self.end_index.map(|end| end - self.start_index)
    }
}

impl fmt::Display for DeviationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_index {
            Some(end) => write!(
                f,
                "{} {} [{}..{}] z0={:.3} max|z|={:.3}",
                self.direction, self.status, self.start_index, end, self.start_zscore, self.max_abs_zscore
            ),
            None => write!(
                f,
                "{} {} [{}..] z0={:.3}",
                self.direction, self.status, self.start_index, self.start_zscore
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(index: usize, zscore: f64) -> BarSnapshot {
        BarSnapshot {
            index,
            value: zscore,
            mean: 0.0,
            volatility: 1.0,
            zscore,
        }
    }

    #[test]
    fn test_open_event() {
        let event = DeviationEvent::open(Direction::Down, snapshot(3, 2.5), Some("d3".into()));
        assert!(event.is_active());
        assert_eq!(event.start_index, 3);
        assert_eq!(event.max_abs_zscore, 2.5);
        assert_eq!(event.duration(), None);
        assert_eq!(event.start_time.as_deref(), Some("d3"));
    }

    #[test]
    fn test_observe_tracks_max() {
        let mut event = DeviationEvent::open(Direction::Up, snapshot(0, -2.0), None);
        event.observe(-3.5);
        event.observe(1.0);
        assert_eq!(event.max_abs_zscore, 3.5);
    }

    #[test]
    fn test_close_is_one_way() {
        let mut event = DeviationEvent::open(Direction::Up, snapshot(1, -2.0), None);
        event.close(EventStatus::Reverted, 4, None).unwrap();
        assert_eq!(event.duration(), Some(3));

        let again = event.close(EventStatus::Failed, 5, None);
        assert_eq!(again, Err(EventError::AlreadyClosed(EventStatus::Reverted)));
        assert_eq!(event.status, EventStatus::Reverted);
    }

    #[test]
    fn test_close_rejects_active_and_backwards() {
        let mut event = DeviationEvent::open(Direction::Up, snapshot(5, -2.0), None);
        assert_eq!(
            event.close(EventStatus::Active, 6, None),
            Err(EventError::NotTerminal)
        );
        assert!(matches!(
            event.close(EventStatus::Expired, 2, None),
            Err(EventError::EndBeforeStart { .. })
        ));
        assert!(event.is_active());
    }

    #[test]
    fn test_bars_alive() {
        let event = DeviationEvent::open(Direction::Down, snapshot(1, 2.0), None);
        assert_eq!(event.bars_alive(1), 1);
        assert_eq!(event.bars_alive(2), 2);
    }

    #[test]
    fn test_display() {
        let mut event = DeviationEvent::open(Direction::Down, snapshot(1, 2.0), None);
        assert!(format!("{}", event).starts_with("DOWN ACTIVE"));
        event.close(EventStatus::Expired, 3, None).unwrap();
        assert!(format!("{}", event).contains("[1..3]"));
    }
}
