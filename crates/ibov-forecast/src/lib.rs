//! # ibov forecast
//!
//! Time-series modelling for the IBOVESPA toolkit: a small ARIMA
//! implementation, stepwise automatic order selection, business-day calendar
//! handling, accuracy metrics and model artifact storage.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`arima`] | ARIMA(p,d,q) fit, apply, refit and forecast |
//! | [`selection`] | KPSS differencing test and stepwise AIC search |
//! | [`calendar`] | Monday–Friday calendar and gap filling |
//! | [`evaluation`] | MAPE, residual diagnostics, descriptive statistics |
//! | [`artifact`] | JSON model artifacts on disk |
//! | [`trainer`] | Warehouse → model → artifact pipeline |
//! | [`optimize`] | Nelder–Mead minimizer |
//!
//! ```rust
//! use ibov_forecast::AutoArima;
//!
//! let fit = AutoArima::default().fit(&[100.0, 101.0, 99.0, 102.0, 103.0])?;
//! let next = fit.model.forecast(1, 0.95)?;
//! assert_eq!(next.len(), 1);
//! assert!(next[0].lower.is_finite() && next[0].upper.is_finite());
//! # Ok::<(), ibov_forecast::ForecastError>(())
//! ```

pub mod arima;
pub mod artifact;
pub mod calendar;
pub mod error;
pub mod evaluation;
pub mod optimize;
pub mod selection;
pub mod trainer;

pub use arima::{ArimaModel, ArimaOrder, ArimaParams, ForecastValue};
pub use artifact::{ArtifactStore, ModelArtifact, MODEL_KEY};
pub use calendar::{next_business_days, regularize_business_days, RegularizedSeries};
pub use error::ForecastError;
pub use evaluation::{
    mape, AccuracyRating, AccuracyReport, Histogram, ResidualDiagnostics, SeriesSummary,
};
pub use selection::{ndiffs, AutoArima, AutoArimaFit, CandidateFit};
pub use trainer::{TrainReport, Trainer, TrainerConfig};

/// Confidence level of every interval the toolkit reports.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
