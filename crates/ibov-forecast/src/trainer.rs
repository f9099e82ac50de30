//! Trainer pipeline: warehouse history → order selection → artifact.

use std::path::PathBuf;

use ibov_core::{ObservationSeries, TradingDate};
use ibov_warehouse::{Warehouse, WarehouseConfig};
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::evaluation::SeriesSummary;
use crate::selection::AutoArima;
use crate::{ArimaOrder, ForecastError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainerConfig {
    pub search: AutoArima,
}

/// Outcome of one training cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub order: ArimaOrder,
    pub with_intercept: bool,
    pub aic: f64,
    pub rows: usize,
    pub first_date: Option<TradingDate>,
    pub last_date: Option<TradingDate>,
    pub candidates_tried: usize,
    pub summary: SeriesSummary,
    pub artifact_path: PathBuf,
}

pub struct Trainer {
    warehouse: WarehouseConfig,
    store: ArtifactStore,
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(warehouse: WarehouseConfig, store: ArtifactStore, config: TrainerConfig) -> Self {
        Self {
            warehouse,
            store,
            config,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Load the full history, fit, and persist the selected model.
    ///
    /// The warehouse is opened read-only and released before fitting starts.
    pub fn run(&self) -> Result<TrainReport, ForecastError> {
        info!("training cycle started");
        let records = Warehouse::open_read_only(self.warehouse.clone())?.load_history(None)?;
        let series = ObservationSeries::from_records(&records)?;
        self.train_series(&series)
    }

    /// Fit and persist a model for an already-loaded series.
    pub fn train_series(&self, series: &ObservationSeries) -> Result<TrainReport, ForecastError> {
        let closes = series.closes();
        let Some(summary) = SeriesSummary::describe(&closes) else {
            warn!("no observations found in the warehouse");
            return Err(ForecastError::EmptyHistory);
        };
        info!(
            rows = summary.count,
            mean = summary.mean,
            std = summary.std,
            min = summary.min,
            p25 = summary.p25,
            p50 = summary.p50,
            p75 = summary.p75,
            max = summary.max,
            "training data loaded"
        );

        let fit = self.config.search.fit(&closes)?;
        let model = fit.model;
        let report_order = model.order();
        let with_intercept = model.with_intercept();
        let aic = model.aic();
        info!(
            order = %report_order,
            params = ?model.params(),
            sigma2 = model.sigma2(),
            "model fitted"
        );

        let artifact = ModelArtifact::new(
            model,
            series.len(),
            series.first_date(),
            series.last_date(),
        );
        let artifact_path = self.store.save(&artifact)?;

        Ok(TrainReport {
            order: report_order,
            with_intercept,
            aic,
            rows: series.len(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            candidates_tried: fit.candidates.len(),
            summary,
            artifact_path,
        })
    }
}
