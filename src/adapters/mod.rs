//! Adapters Layer - External System Implementations
//!
//! - CLI: Command-line interface handlers
//! - Data: JSON series, panel and result files

pub mod cli;
pub mod data;

pub use cli::CliApp;
pub use data::{load_panel, load_series, write_json, DataFileError, PanelFile};
