//! JSON file formats
//!
//! Series file:
//! ```json
//! { "values": [1.0, 1.1], "returns": [0.1], "times": ["2024-01-01", "2024-01-02"] }
//! ```
//!
//! Panel file (one row per date, one column per symbol):
//! ```json
//! { "dates": ["d0", "d1"], "symbols": ["A", "B"], "values": [[1.0, 2.0], [1.1, 2.1]] }
//! ```

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AlignedPanel, SeriesInput};
use crate::error::MrError;

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid data in {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: MrError,
    },
}

/// On-disk panel layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelFile {
    pub dates: Vec<String>,
    pub symbols: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl PanelFile {
    pub fn into_panel(self) -> Result<AlignedPanel, MrError> {
        AlignedPanel::from_rows(self.dates, self.symbols, self.values)
    }
}

fn read(path: &Path) -> Result<String, DataFileError> {
    std::fs::read_to_string(path).map_err(|source| DataFileError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse<T: for<'de> Deserialize<'de>>(path: &Path, content: &str) -> Result<T, DataFileError> {
    serde_json::from_str(content).map_err(|source| DataFileError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Load and validate a series file
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<SeriesInput, DataFileError> {
    let path = path.as_ref();
    let series: SeriesInput = parse(path, &read(path)?)?;
    series
        .view()
        .validate()
        .map_err(|source| DataFileError::Invalid {
            path: path.display().to_string(),
            source,
        })?;
    tracing::debug!("Loaded {} values from {}", series.values.len(), path.display());
    Ok(series)
}

/// Load and validate a panel file
pub fn load_panel<P: AsRef<Path>>(path: P) -> Result<AlignedPanel, DataFileError> {
    let path = path.as_ref();
    let file: PanelFile = parse(path, &read(path)?)?;
    let panel = file.into_panel().map_err(|source| DataFileError::Invalid {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(
        "Loaded panel {} dates x {} symbols from {}",
        panel.n_dates(),
        panel.n_symbols(),
        path.display()
    );
    Ok(panel)
}

/// Pretty JSON to `output`, or to stdout when no path is given
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), DataFileError> {
    let target = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    let json = serde_json::to_string_pretty(value).map_err(|source| DataFileError::Json {
        path: target.clone(),
        source,
    })?;
    let io_err = |source| DataFileError::Io {
        path: target.clone(),
        source,
    };
    match output {
        Some(path) => std::fs::write(path, json + "\n").map_err(io_err),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).map_err(io_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        std::fs::write(&path, r#"{"values": [1.0, 2.0], "times": ["a", "b"]}"#).unwrap();
        let series = load_series(&path).unwrap();
        assert_eq!(series.values, vec![1.0, 2.0]);
        assert_eq!(series.times.unwrap().len(), 2);
    }

    #[test]
    fn test_series_length_mismatch_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        std::fs::write(&path, r#"{"values": [1.0, 2.0], "returns": [0.1, 0.2]}"#).unwrap();
        assert!(matches!(
            load_series(&path),
            Err(DataFileError::Invalid { .. })
        ));
    }

    #[test]
    fn test_unknown_series_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        std::fs::write(&path, r#"{"values": [1.0], "volume": [3.0]}"#).unwrap();
        assert!(matches!(load_series(&path), Err(DataFileError::Json { .. })));
    }

    #[test]
    fn test_load_panel_and_write_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.json");
        let file = PanelFile {
            dates: vec!["d0".into(), "d1".into()],
            symbols: vec!["A".into(), "B".into()],
            values: vec![vec![1.0, 2.0], vec![1.5, 2.5]],
        };
        write_json(&file, Some(&path)).unwrap();
        let panel = load_panel(&path).unwrap();
        assert_eq!(panel.n_symbols(), 2);
        assert_eq!(panel.value(1, 1), 2.5);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_panel("/nonexistent/panel.json"),
            Err(DataFileError::Io { .. })
        ));
    }
}
