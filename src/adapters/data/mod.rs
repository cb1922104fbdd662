//! Data Adapter
//!
//! JSON files in and out of the binary: series, panels, and results.

mod json;

pub use json::{load_panel, load_series, write_json, DataFileError, PanelFile};
