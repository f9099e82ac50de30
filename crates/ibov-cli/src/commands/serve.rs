use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::info;

use ibov_core::{Collector, CsvMarketSource, HttpClient, ReqwestHttpClient, DEFAULT_CONNECTIVITY_URL};
use ibov_forecast::{Trainer, TrainerConfig};
use ibov_web::{collector, dashboard, trainer, CollectorState, DashboardConfig, DashboardState, TrainerState};

use crate::cli::{ServeArgs, Service};
use crate::error::CliError;

use super::Paths;

pub async fn run(paths: &Paths, source_url: &str, args: &ServeArgs) -> Result<(), CliError> {
    let host: IpAddr = args
        .host
        .parse()
        .map_err(|_| CliError::Command(format!("invalid --host '{}'", args.host)))?;
    let addr = SocketAddr::new(host, args.port);
    // Services open the warehouse per cycle or request and never hold it idle.
    let warehouse = paths.warehouse_config();

    let router = match args.service {
        Service::Collector => {
            let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
            collector::router(CollectorState {
                collector: Collector::new(CsvMarketSource::new(Arc::clone(&http), source_url), warehouse),
                http,
                connectivity_url: String::from(DEFAULT_CONNECTIVITY_URL),
            })
        }
        Service::Trainer => trainer::router(TrainerState {
            trainer: Trainer::new(warehouse, paths.artifact_store(), TrainerConfig::default()),
        }),
        Service::Dashboard => dashboard::router(DashboardState {
            warehouse,
            store: paths.artifact_store(),
            config: DashboardConfig::default(),
        }),
    };

    info!(
        service = ?args.service,
        db_path = %paths.db_path.display(),
        model_dir = %paths.model_dir.display(),
        "starting service"
    );
    ibov_web::serve(router, addr).await?;
    Ok(())
}
