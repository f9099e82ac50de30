use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::LogFormat;
use crate::error::CliError;

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
pub fn init(format: LogFormat) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|error| CliError::Logging(error.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|error| CliError::Logging(error.to_string()))
}
