//! Series input: values, optional returns, optional time labels

use serde::{Deserialize, Serialize};

use crate::error::{MrError, Result};

/// How returns are derived from consecutive values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnsMode {
    /// `v[t] / v[t-1] - 1`
    #[default]
    Simple,
    /// `ln(v[t] / v[t-1])`
    Log,
}

/// What the volatility estimator is fed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityUnit {
    /// The raw series value
    #[default]
    Price,
    /// The bar-to-bar return of the series
    Returns,
}

/// Which transform of a basket ratio drives the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSeries {
    #[default]
    Ratio,
    LogRatio,
}

/// Compute the `T-1` returns of a series
pub fn compute_returns(values: &[f64], mode: ReturnsMode) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(values.len().saturating_sub(1));
    compute_returns_into(values, mode, &mut out)?;
    Ok(out)
}

/// Same as [`compute_returns`] but writes into a reusable buffer
pub fn compute_returns_into(values: &[f64], mode: ReturnsMode, out: &mut Vec<f64>) -> Result<()> {
    out.clear();
    for (i, w) in values.windows(2).enumerate() {
        let (prev, cur) = (w[0], w[1]);
        let r = match mode {
            ReturnsMode::Simple => {
                if prev == 0.0 || !prev.is_finite() {
                    return Err(MrError::data(format!(
                        "simple return undefined at bar {}: previous value {}",
                        i + 1,
                        prev
                    )));
                }
                cur / prev - 1.0
            }
            ReturnsMode::Log => {
                if prev <= 0.0 || cur <= 0.0 {
                    return Err(MrError::data(format!(
                        "log return undefined at bar {}: values {} -> {}",
                        i + 1,
                        prev,
                        cur
                    )));
                }
                (cur / prev).ln()
            }
        };
        out.push(r);
    }
    Ok(())
}

/// Returns of a basket signal
///
/// A log-ratio is already in log space, so its bar-to-bar change is its
/// return whatever `mode` says. A plain ratio follows `mode`.
pub fn compute_signal_returns_into(
    signal: &[f64],
    kind: SignalSeries,
    mode: ReturnsMode,
    out: &mut Vec<f64>,
) -> Result<()> {
    match kind {
        SignalSeries::Ratio => compute_returns_into(signal, mode, out),
        SignalSeries::LogRatio => {
            out.clear();
            out.extend(signal.windows(2).map(|w| w[1] - w[0]));
            Ok(())
        }
    }
}

/// Borrowed view of a series, as consumed by the engine
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    pub values: &'a [f64],
    pub returns: Option<&'a [f64]>,
    pub times: Option<&'a [String]>,
}

impl<'a> SeriesView<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self {
            values,
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

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time label for bar `index`, if labels were supplied
    pub fn time(&self, index: usize) -> Option<String> {
        self.times.and_then(|t| t.get(index).cloned())
    }

    /// Check lengths: non-empty values, `T` labels, `T-1` returns
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(MrError::data("series is empty"));
        }
        if let Some(times) = self.times {
            if times.len() != self.values.len() {
                return Err(MrError::data(format!(
                    "times length {} does not match values length {}",
                    times.len(),
                    self.values.len()
                )));
            }
        }
        if let Some(returns) = self.returns {
            if returns.len() != self.values.len() - 1 {
                return Err(MrError::data(format!(
                    "returns length {} must be values length - 1 ({})",
                    returns.len(),
                    self.values.len() - 1
                )));
            }
        }
        Ok(())
    }
}

/// Owned series input
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesInput {
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<String>>,
}

impl SeriesInput {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            returns: None,
            times: None,
        }
    }

    pub fn with_times(mut self, times: Vec<String>) -> Self {
        self.times = Some(times);
        self
    }

    pub fn with_returns(mut self, returns: Vec<f64>) -> Self {
        self.returns = Some(returns);
        self
    }

    /// Attach returns computed from the values
    pub fn with_derived_returns(mut self, mode: ReturnsMode) -> Result<Self> {
        self.returns = Some(compute_returns(&self.values, mode)?);
        Ok(self)
    }

    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            values: &self.values,
            returns: self.returns.as_deref(),
            times: self.times.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simple_returns() {
        let r = compute_returns(&[100.0, 110.0, 99.0], ReturnsMode::Simple).unwrap();
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(r[1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_log_returns() {
        let r = compute_returns(&[1.0, std::f64::consts::E], ReturnsMode::Log).unwrap();
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_returns_reject_non_positive() {
        let err = compute_returns(&[1.0, 0.0], ReturnsMode::Log).unwrap_err();
        assert!(matches!(err, MrError::Data(_)));
    }

    #[test]
    fn test_simple_returns_reject_zero_base() {
        assert!(compute_returns(&[0.0, 1.0], ReturnsMode::Simple).is_err());
    }

    #[test]
    fn test_single_value_has_no_returns() {
        assert!(compute_returns(&[5.0], ReturnsMode::Simple).unwrap().is_empty());
    }

    #[test]
    fn test_log_ratio_returns_are_differences() {
        let mut out = Vec::new();
        compute_signal_returns_into(&[0.0, 0.5, 0.25], SignalSeries::LogRatio, ReturnsMode::Simple, &mut out)
            .unwrap();
        assert_eq!(out, vec![0.5, -0.25]);

        compute_signal_returns_into(&[2.0, 3.0], SignalSeries::Ratio, ReturnsMode::Simple, &mut out).unwrap();
        assert_relative_eq!(out[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_lengths() {
        assert!(SeriesInput::new(vec![]).view().validate().is_err());

        let times = vec!["a".to_string()];
        let bad_times = SeriesInput::new(vec![1.0, 2.0]).with_times(times);
        assert!(bad_times.view().validate().is_err());

        let bad_returns = SeriesInput::new(vec![1.0, 2.0]).with_returns(vec![0.1, 0.2]);
        assert!(bad_returns.view().validate().is_err());

        let ok = SeriesInput::new(vec![1.0, 2.0, 3.0])
            .with_derived_returns(ReturnsMode::Simple)
            .unwrap()
            .with_times(vec!["a".into(), "b".into(), "c".into()]);
        assert!(ok.view().validate().is_ok());
        assert_eq!(ok.view().time(2).as_deref(), Some("c"));
    }
}
