//! Error types for the mrscore crate

use thiserror::Error;

use crate::domain::EventError;

/// Errors raised by the numeric core
///
/// Numeric degeneracy (non-finite z-scores, zero volatility) is never an
/// error: the affected bar is skipped and the run continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MrError {
    /// Invalid parameter domain or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed input data
    #[error("Data error: {0}")]
    Data(String),

    /// Nothing left to invest after transaction costs
    #[error("Insufficient equity for job {job_id} at bar {index}: cash {cash}")]
    InsufficientEquity {
        job_id: String,
        index: usize,
        cash: f64,
    },

    /// Arithmetic overflow in combinatorial counting
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// Illegal deviation-event transition
    #[error("Event lifecycle error: {0}")]
    Event(#[from] EventError),
}

impl MrError {
    pub fn config(msg: impl Into<String>) -> Self {
        MrError::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        MrError::Data(msg.into())
    }

    /// Errors a sweep may skip over while continuing with the next job
    pub fn is_per_job(&self) -> bool {
        matches!(self, MrError::InsufficientEquity { .. } | MrError::Data(_))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, MrError>;
