//! Aligned price panel: one column per symbol on a shared date axis

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{MrError, Result};

/// Immutable T x N panel stored row-major
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPanel {
    dates: Vec<String>,
    symbols: Vec<String>,
    values: Vec<f64>,
}

impl AlignedPanel {
    /// Build from a flat row-major matrix of `dates.len() * symbols.len()` values
    pub fn new(dates: Vec<String>, symbols: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if dates.is_empty() {
            return Err(MrError::config("panel must have at least one date"));
        }
        if symbols.is_empty() {
            return Err(MrError::config("panel must have at least one symbol"));
        }
        let expected = dates.len() * symbols.len();
        if values.len() != expected {
            return Err(MrError::config(format!(
                "panel shape mismatch: {} dates x {} symbols needs {} values, got {}",
                dates.len(),
                symbols.len(),
                expected,
                values.len()
            )));
        }
        let mut seen = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(MrError::config(format!("duplicate symbol in panel: {}", symbol)));
            }
        }
        Ok(Self {
            dates,
            symbols,
            values,
        })
    }

    /// Build from one `Vec` per date
    pub fn from_rows(dates: Vec<String>, symbols: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if rows.len() != dates.len() {
            return Err(MrError::config(format!(
                "panel shape mismatch: {} dates but {} rows",
                dates.len(),
                rows.len()
            )));
        }
        let mut values = Vec::with_capacity(dates.len() * symbols.len());
        for (t, row) in rows.into_iter().enumerate() {
            if row.len() != symbols.len() {
                return Err(MrError::config(format!(
                    "panel shape mismatch: row {} has {} values for {} symbols",
                    t,
                    row.len(),
                    symbols.len()
                )));
            }
            values.extend(row);
        }
        Self::new(dates, symbols, values)
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn n_symbols(&self) -> usize {
        self.symbols.len()
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn row(&self, t: usize) -> &[f64] {
        let n = self.symbols.len();
        &self.values[t * n..(t + 1) * n]
    }

    pub fn value(&self, t: usize, symbol: usize) -> f64 {
        self.values[t * self.symbols.len() + symbol]
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Resolve symbol names into sorted, de-duplicated column indices
    pub fn resolve_basket(&self, names: &[String]) -> Result<Vec<u32>> {
        let mut idx = Vec::with_capacity(names.len());
        for name in names {
            let i = self
                .symbol_index(name)
                .ok_or_else(|| MrError::config(format!("unknown symbol: {}", name)))?;
            idx.push(i as u32);
        }
        idx.sort_unstable();
        idx.dedup();
        if idx.is_empty() {
            return Err(MrError::config("basket must contain at least one symbol"));
        }
        Ok(idx)
    }

    /// Divide every column by its first-row value
    pub fn normalized(&self) -> Result<Self> {
        let base = self.row(0).to_vec();
        if let Some((j, b)) = base.iter().enumerate().find(|(_, b)| **b == 0.0 || !b.is_finite()) {
            return Err(MrError::data(format!(
                "cannot normalize {}: first value is {}",
                self.symbols[j], b
            )));
        }
        let n = self.symbols.len();
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| v / base[i % n])
            .collect();
        Ok(Self {
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> AlignedPanel {
        AlignedPanel::from_rows(
            names(&["d0", "d1"]),
            names(&["AAA", "BBB", "CCC"]),
            vec![vec![10.0, 20.0, 40.0], vec![11.0, 18.0, 40.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_and_access() {
        let panel = sample();
        assert_eq!(panel.n_dates(), 2);
        assert_eq!(panel.n_symbols(), 3);
        assert_eq!(panel.row(1), &[11.0, 18.0, 40.0]);
        assert_eq!(panel.value(0, 2), 40.0);
        assert_eq!(panel.symbol_index("BBB"), Some(1));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = AlignedPanel::new(names(&["d0"]), names(&["A", "B"]), vec![1.0]).unwrap_err();
        assert!(matches!(err, MrError::Config(_)));

        let ragged = AlignedPanel::from_rows(
            names(&["d0", "d1"]),
            names(&["A", "B"]),
            vec![vec![1.0, 2.0], vec![1.0]],
        );
        assert!(ragged.is_err());
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let err = AlignedPanel::new(names(&["d0"]), names(&["A", "A"]), vec![1.0, 2.0]);
        assert!(err.is_err());
    }

    #[test]
    fn test_normalized() {
        let norm = sample().normalized().unwrap();
        assert_eq!(norm.row(0), &[1.0, 1.0, 1.0]);
        assert!((norm.value(1, 0) - 1.1).abs() < 1e-12);
        assert!((norm.value(1, 1) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_rejects_zero_base() {
        let panel = AlignedPanel::new(names(&["d0"]), names(&["A"]), vec![0.0]).unwrap();
        assert!(matches!(panel.normalized(), Err(MrError::Data(_))));
    }

    #[test]
    fn test_resolve_basket() {
        let panel = sample();
        assert_eq!(panel.resolve_basket(&names(&["CCC", "AAA"])).unwrap(), vec![0, 2]);
        assert!(panel.resolve_basket(&names(&["ZZZ"])).is_err());
    }
}
