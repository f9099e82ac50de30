//! Persisted model artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use ibov_core::TradingDate;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{ArimaModel, ForecastError};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Fixed location of the model inside the artifact root.
pub const MODEL_KEY: &str = "models/arima_model.json";

/// A fitted model plus the provenance of its training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model: ArimaModel,
    /// RFC 3339 UTC timestamp.
    pub trained_at: String,
    pub training_rows: usize,
    pub first_date: Option<TradingDate>,
    pub last_date: Option<TradingDate>,
}

impl ModelArtifact {
    pub fn new(
        model: ArimaModel,
        training_rows: usize,
        first_date: Option<TradingDate>,
        last_date: Option<TradingDate>,
    ) -> Self {
        let trained_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"));
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model,
            trained_at,
            training_rows,
            first_date,
            last_date,
        }
    }
}

/// Directory-backed artifact storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_KEY)
    }

    pub fn exists(&self) -> bool {
        self.model_path().is_file()
    }

    /// Write the artifact through a temporary file and rename it into place,
    /// so readers never observe a partial write.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf, ForecastError> {
        let path = self.model_path();
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let body = serde_json::to_vec_pretty(artifact)?;
        let tmp = parent.join(format!(".arima_model.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, body)?;
        if let Err(error) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(error.into());
        }

        info!(path = %path.display(), order = %artifact.model.order(), "model artifact saved");
        Ok(path)
    }

    pub fn load(&self) -> Result<ModelArtifact, ForecastError> {
        let path = self.model_path();
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForecastError::ArtifactNotFound { path });
            }
            Err(error) => return Err(error.into()),
        };

        let artifact: ModelArtifact = serde_json::from_slice(&body)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ForecastError::UnsupportedArtifact {
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        Ok(artifact)
    }
}
