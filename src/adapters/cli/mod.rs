//! CLI Adapter
//!
//! Command-line interface for the mrscore binary.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{execute, BacktestCmd, CliApp, Command, CountCmd, RankCmd, ScoreCmd};

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
