use thiserror::Error;

use crate::http_client::HttpError;

/// Validation error for domain-level invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("trading date must be YYYY-MM-DD: '{value}'")]
    InvalidTradingDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("date range start {from} is after end {to}")]
    InvalidDateRange { from: String, to: String },
}

/// Failure while fetching or cleaning the market-data export.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("source unavailable: HTTP {status} from {url}")]
    Unavailable { status: u16, url: String },

    #[error("malformed CSV: {reason}")]
    Malformed { reason: String },

    #[error("CSV export contained no usable observations")]
    Empty,
}

impl From<csv::Error> for SourceError {
    fn from(error: csv::Error) -> Self {
        Self::Malformed {
            reason: error.to_string(),
        }
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Warehouse(#[from] ibov_warehouse::WarehouseError),

    #[error("blocking task failed: {0}")]
    Join(String),
}
