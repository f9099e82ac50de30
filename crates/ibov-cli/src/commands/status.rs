use serde_json::Value;

use crate::cli::StatusArgs;
use crate::error::CliError;

use super::Paths;

pub fn run(paths: &Paths, args: &StatusArgs) -> Result<Value, CliError> {
    let status = paths.open_warehouse_read_only()?.status(args.recent)?;
    Ok(serde_json::to_value(status)?)
}
