//! CLI argument definitions for `ibov`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `collect` | Fetch the IBOVESPA export and upsert it into the warehouse |
//! | `check-connection` | Probe outbound HTTP connectivity |
//! | `train` | Select and fit an ARIMA model, save the artifact |
//! | `forecast` | Forecast from the stored artifact |
//! | `status` | Summarize what the warehouse holds |
//! | `serve` | Run the collector, trainer or dashboard HTTP service |
//!
//! Every global option can also be set through its environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ibov_core::{DEFAULT_CONNECTIVITY_URL, DEFAULT_SOURCE_URL};

#[derive(Debug, Parser)]
#[command(
    name = "ibov",
    author,
    version,
    about = "Collect IBOVESPA closes, train an ARIMA model and serve forecasts"
)]
pub struct Cli {
    /// Data root for the warehouse and model artifacts.
    #[arg(long, global = true, env = "IBOV_HOME")]
    pub home: Option<PathBuf>,

    /// DuckDB file (default: <home>/warehouse/ibovespa.duckdb).
    #[arg(long, global = true, env = "IBOV_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Artifact storage root (default: <home>/artifacts).
    #[arg(long, global = true, env = "IBOV_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// CSV export to collect from.
    #[arg(long, global = true, env = "IBOV_SOURCE_URL", default_value = DEFAULT_SOURCE_URL)]
    pub source_url: String,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log line format on stderr. Verbosity comes from `RUST_LOG`.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one fetch → clean → upsert cycle and print the report.
    Collect,

    /// Check that an outbound HTTP request succeeds.
    CheckConnection(CheckConnectionArgs),

    /// Train on the full warehouse history and save the model artifact.
    Train,

    /// Print forecast points from the stored model.
    ///
    /// # Examples
    ///
    ///   ibov forecast --horizon 30
    ///   ibov forecast --horizon 60 --no-update --pretty
    Forecast(ForecastArgs),

    /// Show row count, date span, latest close and recent collector batches.
    ///
    /// Opens the warehouse read-only, so it works while a service is running.
    Status(StatusArgs),

    /// Serve one of the HTTP services.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct CheckConnectionArgs {
    #[arg(long, default_value = DEFAULT_CONNECTIVITY_URL)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Business days to forecast.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u16).range(1..))]
    pub horizon: u16,

    /// Forecast with the stored coefficients instead of updating on recent data.
    #[arg(long, default_value_t = false)]
    pub no_update: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Collector batches to list, newest first.
    #[arg(long, default_value_t = 5)]
    pub recent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Service {
    Collector,
    Trainer,
    Dashboard,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(value_enum)]
    pub service: Service,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_with_defaults() {
        let cli = Cli::try_parse_from(["ibov", "serve", "dashboard"]).expect("parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.service, Service::Dashboard);
        assert_eq!(args.host, "0.0.0.0");
    }

    #[test]
    fn status_lists_five_batches_by_default() {
        let cli = Cli::try_parse_from(["ibov", "status"]).expect("parse");
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.recent, 5);
    }

    #[test]
    fn rejects_zero_horizon() {
        assert!(Cli::try_parse_from(["ibov", "forecast", "--horizon", "0"]).is_err());
    }

    #[test]
    fn global_options_follow_subcommands() {
        let cli = Cli::try_parse_from(["ibov", "train", "--home", "/tmp/ibov", "--pretty"]).expect("parse");
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/ibov")));
        assert!(cli.pretty);
        assert!(matches!(cli.command, Command::Train));
    }
}
