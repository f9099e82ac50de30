mod collect;
mod forecast;
mod serve;
mod status;
mod train;

use std::path::PathBuf;

use serde_json::Value;

use ibov_forecast::ArtifactStore;
use ibov_warehouse::{resolve_ibov_home, Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Filesystem layout resolved from flags, environment and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
}

impl Paths {
    pub fn resolve(cli: &Cli) -> Self {
        let home = cli.home.clone().unwrap_or_else(resolve_ibov_home);
        let db_path = cli
            .db_path
            .clone()
            .unwrap_or_else(|| WarehouseConfig::in_home(&home).db_path);
        let model_dir = cli
            .model_dir
            .clone()
            .unwrap_or_else(|| home.join("artifacts"));
        Self {
            home,
            db_path,
            model_dir,
        }
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            db_path: self.db_path.clone(),
            ..WarehouseConfig::in_home(&self.home)
        }
    }

    /// Shared-lock handle for commands that only read.
    pub fn open_warehouse_read_only(&self) -> Result<Warehouse, CliError> {
        Ok(Warehouse::open_read_only(self.warehouse_config())?)
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.model_dir)
    }
}

/// Run the selected command. `None` means the command has no JSON output.
pub async fn run(cli: &Cli) -> Result<Option<Value>, CliError> {
    let paths = Paths::resolve(cli);
    match &cli.command {
        Command::Collect => collect::run(&paths, &cli.source_url).await.map(Some),
        Command::CheckConnection(args) => collect::check_connection(args).await.map(Some),
        Command::Train => train::run(&paths).map(Some),
        Command::Forecast(args) => forecast::run(&paths, args).map(Some),
        Command::Status(args) => status::run(&paths, args).map(Some),
        Command::Serve(args) => serve::run(&paths, &cli.source_url, args).await.map(|()| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn explicit_paths_override_home_layout() {
        let cli = Cli::try_parse_from([
            "ibov",
            "train",
            "--home",
            "/data/ibov",
            "--model-dir",
            "/models",
        ])
        .expect("parse");
        let paths = Paths::resolve(&cli);
        assert_eq!(paths.home, PathBuf::from("/data/ibov"));
        assert_eq!(paths.model_dir, PathBuf::from("/models"));
        if std::env::var_os("IBOV_DB_PATH").is_none() {
            assert_eq!(
                paths.db_path,
                PathBuf::from("/data/ibov/warehouse/ibovespa.duckdb")
            );
        }
    }
}
