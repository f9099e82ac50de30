use serde_json::{json, Value};

use ibov_web::dashboard::{build_view, DashboardConfig, DashboardSettings, DEFAULT_HISTORY};

use crate::cli::ForecastArgs;
use crate::error::CliError;

use super::Paths;

pub fn run(paths: &Paths, args: &ForecastArgs) -> Result<Value, CliError> {
    let settings = DashboardSettings {
        horizon: usize::from(args.horizon),
        history: DEFAULT_HISTORY,
        update: !args.no_update,
        ..DashboardSettings::default()
    };
    let view = build_view(
        &paths.open_warehouse_read_only()?,
        &paths.artifact_store(),
        &DashboardConfig::default(),
        settings,
    )?;

    Ok(json!({
        "order": view.model.order,
        "with_intercept": view.model.with_intercept,
        "trained_at": view.model.trained_at,
        "update": view.model.update,
        "last_observation": view.processed.last_date(),
        "horizon": view.settings.horizon,
        "points": view.forecast,
        "test_accuracy": view.evaluation.and_then(|evaluation| evaluation.accuracy),
    }))
}
