//! mrscore - Mean-reversion detection, scoring and rotation backtesting
//!
//! Thin binary over the library: parse arguments, set up logging, dispatch.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use mrscore::adapters::cli::{self, CliApp};
use mrscore::config::load_config;

fn main() -> Result<()> {
    let app = cli::init();

    // Fall back to the config file's [logging] level when no flag is given
    let config_level = app
        .command
        .config_path()
        .map(|p| shellexpand::tilde(&p.to_string_lossy()).into_owned())
        .and_then(|p| load_config(p).ok())
        .map(|c| c.logging.level);
    init_logging(&app, config_level)?;

    cli::execute(app)
}

fn init_logging(app: &CliApp, config_level: Option<String>) -> Result<()> {
    let filter = if app.debug {
        EnvFilter::new("debug")
    } else if app.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config_level.as_deref().unwrap_or("warn")))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
