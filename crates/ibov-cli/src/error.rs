use thiserror::Error;

use ibov_core::{CoreError, SourceError, ValidationError};
use ibov_forecast::ForecastError;
use ibov_warehouse::WarehouseError;
use ibov_web::WebError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Web(#[from] WebError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Command(_) => 2,
            Self::Source(_) => 3,
            Self::Warehouse(_) => 4,
            Self::Core(error) => core_exit_code(error),
            Self::Forecast(error) => forecast_exit_code(error),
            Self::Web(error) => match error {
                WebError::BadRequest(_) => 2,
                WebError::Core(error) => core_exit_code(error),
                WebError::Forecast(error) => forecast_exit_code(error),
                WebError::Warehouse(_) => 4,
                WebError::Join(_) => 10,
            },
            Self::Serialization(_) => 6,
            Self::Logging(_) | Self::Io(_) => 10,
        }
    }
}

fn core_exit_code(error: &CoreError) -> u8 {
    match error {
        CoreError::Source(_) => 3,
        CoreError::Warehouse(_) => 4,
        CoreError::Join(_) => 10,
    }
}

fn forecast_exit_code(error: &ForecastError) -> u8 {
    match error {
        ForecastError::Validation(_) | ForecastError::InvalidParameter { .. } => 2,
        ForecastError::Warehouse(_) => 4,
        ForecastError::Serialization(_) => 6,
        ForecastError::Io(_) => 10,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(CliError::Command(String::from("empty")).exit_code(), 2);
        assert_eq!(CliError::Source(SourceError::Empty).exit_code(), 3);
        assert_eq!(CliError::Core(CoreError::Source(SourceError::Empty)).exit_code(), 3);
        assert_eq!(CliError::Forecast(ForecastError::EmptyHistory).exit_code(), 5);
        assert_eq!(
            CliError::Web(WebError::Forecast(ForecastError::NoModel { tried: 3 })).exit_code(),
            5
        );
        assert_eq!(
            CliError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).exit_code(),
            10
        );
    }
}
