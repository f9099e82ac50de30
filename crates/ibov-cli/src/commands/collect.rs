use std::sync::Arc;

use serde_json::{json, Value};

use ibov_core::{check_connectivity, Collector, CsvMarketSource, ReqwestHttpClient};

use crate::cli::CheckConnectionArgs;
use crate::error::CliError;

use super::Paths;

pub async fn run(paths: &Paths, source_url: &str) -> Result<Value, CliError> {
    let source = CsvMarketSource::new(Arc::new(ReqwestHttpClient::new()), source_url);
    let report = Collector::new(source, paths.warehouse_config()).run().await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn check_connection(args: &CheckConnectionArgs) -> Result<Value, CliError> {
    let client = ReqwestHttpClient::new();
    let status_code = check_connectivity(&client, &args.url).await?;
    Ok(json!({
        "url": args.url,
        "status_code": status_code,
    }))
}
