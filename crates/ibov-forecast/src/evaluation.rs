//! Forecast accuracy, residual diagnostics and descriptive statistics.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::ForecastError;

/// Mean absolute percentage error, in percent. Pairs whose actual value is zero
/// are ignored; `None` when no pair remains.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0_usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });
    (count > 0).then(|| sum / count as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyRating {
    Excellent,
    Good,
    Acceptable,
    Low,
}

impl AccuracyRating {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 95.0 {
            Self::Excellent
        } else if accuracy >= 85.0 {
            Self::Good
        } else if accuracy >= 70.0 {
            Self::Acceptable
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Low => "low",
        }
    }
}

impl Display for AccuracyRating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// MAPE-based accuracy of a hold-out forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub mape: f64,
    /// `100 - mape`.
    pub accuracy: f64,
    pub rating: AccuracyRating,
    pub points: usize,
}

impl AccuracyReport {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let mape = mape(actual, predicted)?;
        let accuracy = 100.0 - mape;
        Some(Self {
            mape,
            accuracy,
            rating: AccuracyRating::from_accuracy(accuracy),
            points: actual.len().min(predicted.len()),
        })
    }
}

/// Location, spread and Jarque–Bera normality test of model residuals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub jarque_bera: f64,
    pub p_value: f64,
    /// `p_value > 0.05`.
    pub looks_normal: bool,
}

impl ResidualDiagnostics {
    pub const MIN_RESIDUALS: usize = 4;
    pub const SIGNIFICANCE: f64 = 0.05;

    pub fn compute(residuals: &[f64]) -> Result<Self, ForecastError> {
        let n = residuals.len();
        if n < Self::MIN_RESIDUALS {
            return Err(ForecastError::InsufficientData {
                needed: Self::MIN_RESIDUALS,
                got: n,
            });
        }

        let count = n as f64;
        let mean = residuals.iter().sum::<f64>() / count;
        let moment = |k: i32| residuals.iter().map(|r| (r - mean).powi(k)).sum::<f64>() / count;
        let m2 = moment(2);
        let std_dev = m2.sqrt();

        let (jarque_bera, p_value) = if m2 > 0.0 {
            let skewness = moment(3) / m2.powf(1.5);
            let kurtosis = moment(4) / (m2 * m2);
            let statistic = count / 6.0 * (skewness.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
            let p_value = 1.0 - ChiSquared::new(2.0)?.cdf(statistic);
            (statistic, p_value)
        } else {
            (0.0, 1.0)
        };

        Ok(Self {
            count: n,
            mean,
            std_dev,
            jarque_bera,
            p_value,
            looks_normal: p_value > Self::SIGNIFICANCE,
        })
    }
}

/// Fixed-width histogram of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub bin_width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn build(values: &[f64], bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let span = max - min;
        let bin_width = if span > 0.0 { span / bins as f64 } else { 1.0 };
        let mut counts = vec![0; bins];
        for value in values {
            let index = (((value - min) / bin_width) as usize).min(bins - 1);
            counts[index] += 1;
        }
        Some(Self {
            min,
            bin_width,
            counts,
        })
    }
}

/// Count, mean, sample std, min, quartiles and max of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl SeriesSummary {
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count,
            mean,
            std,
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// Linear-interpolation quantile of pre-sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mape_ignores_zero_actuals() {
        let value = mape(&[100.0, 0.0, 200.0], &[110.0, 5.0, 180.0]).expect("mape");
        assert!((value - 10.0).abs() < 1e-12);
        assert_eq!(mape(&[0.0, 0.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn accuracy_bands() {
        assert_eq!(AccuracyRating::from_accuracy(97.0), AccuracyRating::Excellent);
        assert_eq!(AccuracyRating::from_accuracy(95.0), AccuracyRating::Excellent);
        assert_eq!(AccuracyRating::from_accuracy(90.0), AccuracyRating::Good);
        assert_eq!(AccuracyRating::from_accuracy(70.0), AccuracyRating::Acceptable);
        assert_eq!(AccuracyRating::from_accuracy(12.0), AccuracyRating::Low);

        let report = AccuracyReport::evaluate(&[100.0, 200.0], &[98.0, 204.0]).expect("report");
        assert!((report.accuracy - 98.0).abs() < 1e-9);
        assert_eq!(report.rating, AccuracyRating::Excellent);
    }

    #[test]
    fn symmetric_residuals_look_normal() {
        let residuals = [-2.0, -1.0, -0.5, 0.0, 0.0, 0.5, 1.0, 2.0, -1.5, 1.5];
        let diagnostics = ResidualDiagnostics::compute(&residuals).expect("diagnostics");
        assert!(diagnostics.mean.abs() < 1e-12);
        assert!(diagnostics.looks_normal);
        assert!(diagnostics.p_value > 0.05 && diagnostics.p_value <= 1.0);
    }

    #[test]
    fn heavy_outlier_fails_normality() {
        let mut residuals = vec![0.1; 200];
        for (i, r) in residuals.iter_mut().enumerate() {
            *r = if i % 2 == 0 { 0.1 } else { -0.1 };
        }
        residuals[0] = 50.0;
        let diagnostics = ResidualDiagnostics::compute(&residuals).expect("diagnostics");
        assert!(!diagnostics.looks_normal);
    }

    #[test]
    fn too_few_residuals_is_an_error() {
        assert!(ResidualDiagnostics::compute(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn describe_matches_linear_quantiles() {
        let summary = SeriesSummary::describe(&[4.0, 1.0, 3.0, 2.0]).expect("summary");
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert!((summary.p25 - 1.75).abs() < 1e-12);
        assert!((summary.p50 - 2.5).abs() < 1e-12);
        assert!((summary.p75 - 3.25).abs() < 1e-12);
        assert!((summary.std - 1.2909944487358056).abs() < 1e-12);
    }

    #[test]
    fn histogram_puts_max_in_last_bin() {
        let histogram = Histogram::build(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).expect("histogram");
        assert_eq!(histogram.counts, vec![1, 1, 1, 2]);
        assert!(Histogram::build(&[], 4).is_none());
    }
}
