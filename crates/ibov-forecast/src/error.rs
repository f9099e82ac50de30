use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fitting, evaluating or persisting forecast models.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("not enough observations: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("no observations available for training")]
    EmptyHistory,

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("model fit failed for {order}: {reason}")]
    FitFailed { order: String, reason: String },

    #[error("no candidate model could be fitted ({tried} tried)")]
    NoModel { tried: usize },

    #[error("model artifact not found at {path}")]
    ArtifactNotFound { path: PathBuf },

    #[error("unsupported artifact format version {found}, expected {expected}")]
    UnsupportedArtifact { found: u32, expected: u32 },

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Warehouse(#[from] ibov_warehouse::WarehouseError),

    #[error(transparent)]
    Validation(#[from] ibov_core::ValidationError),
}

impl From<statrs::StatsError> for ForecastError {
    fn from(error: statrs::StatsError) -> Self {
        Self::Statistics(error.to_string())
    }
}
