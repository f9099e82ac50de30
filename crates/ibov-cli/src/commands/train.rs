use serde_json::Value;

use ibov_forecast::{Trainer, TrainerConfig};

use crate::error::CliError;

use super::Paths;

pub fn run(paths: &Paths) -> Result<Value, CliError> {
    let trainer = Trainer::new(
        paths.warehouse_config(),
        paths.artifact_store(),
        TrainerConfig::default(),
    );
    let report = trainer.run()?;
    Ok(serde_json::to_value(report)?)
}
