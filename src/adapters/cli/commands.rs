//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the mrscore binary.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::adapters::data::{load_panel, load_series, write_json};
use crate::application::{
    apply_signal, basket_label, estimate_ratio_count, is_disjoint, BacktestInput, LegSeries,
    MeanReversionEngine, RatioUniverse, RotationBacktester, UniverseRunner,
};
use crate::config::{load_config, MrConfig, UniverseConfig};
use crate::domain::VolatilityUnit;

/// mrscore - Mean-reversion scoring and rotation backtesting
#[derive(Parser, Debug)]
#[command(
    name = "mrscore",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Mean-reversion detection, scoring and rotation backtesting",
    long_about = "mrscore tracks deviation events on a series, scores how often they revert, \
                  and backtests a single-leg rotation strategy over basket ratio universes."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score deviation events on a single series
    Score(ScoreCmd),

    /// Backtest the rotation strategy on one basket ratio
    Backtest(BacktestCmd),

    /// Rank every basket ratio of a panel
    Rank(RankCmd),

    /// Count the ratio jobs of a universe
    Count(CountCmd),
}

impl Command {
    /// Configuration file used by the command, if any
    pub fn config_path(&self) -> Option<&Path> {
        match self {
            Command::Score(cmd) => Some(cmd.config.as_path()),
            Command::Backtest(cmd) => Some(cmd.config.as_path()),
            Command::Rank(cmd) => Some(cmd.config.as_path()),
            Command::Count(cmd) => cmd.config.as_deref(),
        }
    }
}

/// Score a series
#[derive(Parser, Debug)]
pub struct ScoreCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mrscore.toml")]
    pub config: PathBuf,

    /// Series JSON file
    #[arg(short, long, value_name = "FILE")]
    pub series: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Backtest one ratio
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mrscore.toml")]
    pub config: PathBuf,

    /// Panel JSON file
    #[arg(short, long, value_name = "FILE")]
    pub panel: PathBuf,

    /// Numerator basket symbols
    #[arg(long, value_name = "SYMBOLS", value_delimiter = ',', required = true)]
    pub num: Vec<String>,

    /// Denominator basket symbols
    #[arg(long, value_name = "SYMBOLS", value_delimiter = ',', required = true)]
    pub den: Vec<String>,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Rank a universe
#[derive(Parser, Debug)]
pub struct RankCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/mrscore.toml")]
    pub config: PathBuf,

    /// Panel JSON file
    #[arg(short, long, value_name = "FILE")]
    pub panel: PathBuf,

    /// Numerator basket size
    #[arg(long, value_name = "K")]
    pub k_num: usize,

    /// Denominator basket size
    #[arg(long, value_name = "K")]
    pub k_den: usize,

    /// Override ranking.top_k
    #[arg(long, value_name = "N")]
    pub top_k: Option<usize>,

    /// Override ranking.max_jobs
    #[arg(long, value_name = "N")]
    pub max_jobs: Option<usize>,

    /// Evaluate jobs in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Count ratio jobs
#[derive(Parser, Debug)]
pub struct CountCmd {
    /// Number of symbols
    #[arg(short, long, value_name = "N")]
    pub n: usize,

    /// Numerator basket size
    #[arg(long, value_name = "K")]
    pub k_num: usize,

    /// Denominator basket size
    #[arg(long, value_name = "K")]
    pub k_den: usize,

    /// Take universe options from this configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Execute the CLI command
pub fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Score(cmd) => score_command(cmd),
        Command::Backtest(cmd) => backtest_command(cmd),
        Command::Rank(cmd) => rank_command(cmd),
        Command::Count(cmd) => count_command(cmd),
    }
}

/// Expand `~` in a user supplied path
fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn load(path: &Path) -> Result<MrConfig> {
    let path = expand(path);
    load_config(&path).with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let output = output.map(expand);
    write_json(value, output.as_deref()).context("Failed to write result")
}

/// Handle score command
fn score_command(cmd: ScoreCmd) -> Result<()> {
    let config = load(&cmd.config)?;
    let mut series = load_series(expand(&cmd.series)).context("Failed to load series")?;

    if config.data.volatility_unit == VolatilityUnit::Returns && series.returns.is_none() {
        series = series
            .with_derived_returns(config.data.returns_mode)
            .context("Failed to derive returns")?;
    }

    let mut engine = MeanReversionEngine::from_config(&config).context("Invalid configuration")?;
    let result = engine.run(series.view()).context("Scoring failed")?;
    tracing::info!(
        "Scored {} bars: {} events, score {:.4}",
        series.values.len(),
        result.total_events,
        result.score
    );
    emit(&result, cmd.output.as_deref())
}

/// Handle backtest command
fn backtest_command(cmd: BacktestCmd) -> Result<()> {
    let config = load(&cmd.config)?;
    let Some(backtest) = config.backtest.as_ref() else {
        bail!("Configuration has no [backtest] section");
    };
    let signal_series = backtest.signal_series();
    let panel = load_panel(expand(&cmd.panel)).context("Failed to load panel")?;
    let universe = RatioUniverse::new(panel, config.universe.clone().unwrap_or_default())?;

    let num = universe.panel().resolve_basket(&cmd.num)?;
    let den = universe.panel().resolve_basket(&cmd.den)?;
    if universe.config().disallow_overlap && !is_disjoint(&num, &den) {
        bail!("Numerator and denominator baskets overlap");
    }
    let job_id = basket_label(universe.panel(), &num, &den);

    let mut legs = LegSeries::default();
    universe.legs_into(&num, &den, &mut legs);
    let mut signal = Vec::new();
    universe.ratio_into(&num, &den, &mut signal);
    apply_signal(signal_series, &mut signal);

    let mut backtester = RotationBacktester::from_config(&config)?;
    let input = BacktestInput::new(&signal, &legs.numerator, &legs.denominator)
        .with_times(universe.panel().dates());
    let result = backtester
        .run(&job_id, input)
        .with_context(|| format!("Backtest of {} failed", job_id))?;
    tracing::info!(
        "Backtest {}: {} trades, return {:.4}",
        job_id,
        result.trade_count,
        result.total_return
    );
    emit(&result, cmd.output.as_deref())
}

/// Handle rank command
fn rank_command(cmd: RankCmd) -> Result<()> {
    let config = load(&cmd.config)?;
    let mut ranking = config.ranking.clone().unwrap_or_default();
    if let Some(top_k) = cmd.top_k {
        ranking.top_k = top_k;
    }
    if cmd.max_jobs.is_some() {
        ranking.max_jobs = cmd.max_jobs;
    }
    ranking.parallel |= cmd.parallel;

    let panel = load_panel(expand(&cmd.panel)).context("Failed to load panel")?;
    let mut universe = RatioUniverse::new(panel, config.universe.clone().unwrap_or_default())?;
    let estimate = universe.estimate_ratio_count(cmd.k_num, cmd.k_den)?;
    tracing::info!(
        "Ranking up to {} jobs ({})",
        estimate.jobs,
        if estimate.exact { "exact" } else { "upper bound" }
    );

    let runner = UniverseRunner::with_ranking(config, ranking)?;
    let report = runner.rank(&mut universe, cmd.k_num, cmd.k_den)?;
    emit(&report, cmd.output.as_deref())
}

#[derive(Debug, Serialize)]
struct CountReport {
    n: usize,
    k_num: usize,
    k_den: usize,
    jobs: u128,
    exact: bool,
}

/// Handle count command
fn count_command(cmd: CountCmd) -> Result<()> {
    let universe = match &cmd.config {
        Some(path) => load(path)?.universe.unwrap_or_default(),
        None => UniverseConfig::default(),
    };
    let estimate = estimate_ratio_count(cmd.n, cmd.k_num, cmd.k_den, &universe)?;
    emit(
        &CountReport {
            n: cmd.n,
            k_num: cmd.k_num,
            k_den: cmd.k_den,
            jobs: estimate.jobs,
            exact: estimate.exact,
        },
        None,
    )
}
