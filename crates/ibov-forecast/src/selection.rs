//! Automatic ARIMA order selection.
//!
//! The differencing order comes from repeated KPSS level-stationarity tests;
//! `p` and `q` come from a stepwise AIC search around a starting order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::arima::{difference, min_observations, ArimaModel, ArimaOrder};
use crate::ForecastError;

/// KPSS level-stationarity critical value at the 5% level.
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// KPSS statistic for level stationarity with `trunc(3√n / 13)` Bartlett lags.
///
/// Returns `None` for series shorter than two points or with zero variance.
pub fn kpss_statistic(series: &[f64]) -> Option<f64> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let residuals: Vec<f64> = series.iter().map(|value| value - mean).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for residual in &residuals {
        partial += residual;
        eta += partial * partial;
    }
    eta /= (n * n) as f64;

    let lags = (3.0 * (n as f64).sqrt() / 13.0).trunc() as usize;
    let mut long_run = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
    for lag in 1..=lags.min(n - 1) {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let autocov: f64 = residuals[lag..]
            .iter()
            .zip(&residuals[..n - lag])
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * autocov / n as f64;
    }

    if long_run <= 0.0 || !long_run.is_finite() {
        return None;
    }
    Some(eta / long_run)
}

fn is_constant(series: &[f64]) -> bool {
    series.windows(2).all(|pair| pair[0] == pair[1])
}

/// Number of differences needed for level stationarity, capped at `max_d`.
pub fn ndiffs(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    if is_constant(&current) {
        return 0;
    }
    let Some(mut statistic) = kpss_statistic(&current) else {
        return 0;
    };

    let mut d = 0;
    while statistic > KPSS_CRITICAL_5PCT && d < max_d {
        d += 1;
        current = difference(&current, 1);
        if is_constant(&current) {
            return d;
        }
        match kpss_statistic(&current) {
            Some(next) => statistic = next,
            None => return d - 1,
        }
    }
    d
}

/// One model tried during the search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateFit {
    pub order: ArimaOrder,
    pub with_intercept: bool,
    /// `None` when the candidate was skipped or failed to fit.
    pub aic: Option<f64>,
}

/// Selected model plus the full search trace.
#[derive(Debug, Clone)]
pub struct AutoArimaFit {
    pub model: ArimaModel,
    pub candidates: Vec<CandidateFit>,
}

/// Stepwise auto-ARIMA configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoArima {
    pub start_p: usize,
    pub start_q: usize,
    pub max_p: usize,
    pub max_q: usize,
    /// Upper bound on `p + q`.
    pub max_order: usize,
    pub max_d: usize,
    /// Hard cap on the number of candidate fits.
    pub max_models: usize,
}

impl Default for AutoArima {
    fn default() -> Self {
        Self {
            start_p: 1,
            start_q: 1,
            max_p: 5,
            max_q: 5,
            max_order: 5,
            max_d: 2,
            max_models: 100,
        }
    }
}

type CandidateKey = (usize, usize, bool);

struct Search<'a> {
    series: &'a [f64],
    d: usize,
    max_models: usize,
    tried: BTreeMap<CandidateKey, Option<f64>>,
    trace: Vec<CandidateFit>,
    best: Option<ArimaModel>,
}

impl Search<'_> {
    /// Fit a candidate once; returns true when it became the new best.
    fn try_fit(&mut self, p: usize, q: usize, with_intercept: bool) -> bool {
        let key = (p, q, with_intercept);
        if self.tried.contains_key(&key) || self.tried.len() >= self.max_models {
            return false;
        }

        let order = ArimaOrder::new(p, self.d, q);
        let result = if self.series.len() < min_observations(order, with_intercept) {
            None
        } else {
            match ArimaModel::fit(self.series, order, with_intercept) {
                Ok(model) => Some(model),
                Err(error) => {
                    debug!(%order, with_intercept, %error, "candidate failed");
                    None
                }
            }
        };

        let aic = result.as_ref().map(ArimaModel::aic).filter(|aic| aic.is_finite());
        debug!(
            %order,
            with_intercept,
            aic = aic.unwrap_or(f64::NAN),
            "candidate evaluated"
        );
        self.tried.insert(key, aic);
        self.trace.push(CandidateFit {
            order,
            with_intercept,
            aic,
        });

        let (Some(model), Some(aic)) = (result, aic) else {
            return false;
        };
        let improves = match &self.best {
            Some(best) => aic < best.aic(),
            None => true,
        };
        if improves {
            self.best = Some(model);
        }
        improves
    }
}

impl AutoArima {
    /// Choose `d`, then search `(p, q)` stepwise by AIC and return the best fit.
    pub fn fit(&self, series: &[f64]) -> Result<AutoArimaFit, ForecastError> {
        if series.len() < 3 {
            return Err(ForecastError::InsufficientData {
                needed: 3,
                got: series.len(),
            });
        }

        let d = ndiffs(series, self.max_d);
        let allow_intercept = d <= 1;
        info!(d, rows = series.len(), "differencing order selected");

        let mut search = Search {
            series,
            d,
            max_models: self.max_models.max(1),
            tried: BTreeMap::new(),
            trace: Vec::new(),
            best: None,
        };

        let start_p = self.start_p.min(self.max_p);
        let start_q = self.start_q.min(self.max_q);
        search.try_fit(start_p, start_q, allow_intercept);
        search.try_fit(0, 0, allow_intercept);
        if self.max_p > 0 {
            search.try_fit(1, 0, allow_intercept);
        }
        if self.max_q > 0 {
            search.try_fit(0, 1, allow_intercept);
        }
        if allow_intercept {
            search.try_fit(0, 0, false);
        }

        loop {
            let Some(best) = &search.best else {
                break;
            };
            let ArimaOrder { p, q, .. } = best.order();
            let intercept = best.with_intercept();

            let mut neighbours: Vec<CandidateKey> = Vec::with_capacity(9);
            if p > 0 {
                neighbours.push((p - 1, q, intercept));
            }
            if p < self.max_p {
                neighbours.push((p + 1, q, intercept));
            }
            if q > 0 {
                neighbours.push((p, q - 1, intercept));
            }
            if q < self.max_q {
                neighbours.push((p, q + 1, intercept));
            }
            if p > 0 && q > 0 {
                neighbours.push((p - 1, q - 1, intercept));
            }
            if p < self.max_p && q < self.max_q {
                neighbours.push((p + 1, q + 1, intercept));
            }
            if p > 0 && q < self.max_q {
                neighbours.push((p - 1, q + 1, intercept));
            }
            if p < self.max_p && q > 0 {
                neighbours.push((p + 1, q - 1, intercept));
            }
            if allow_intercept {
                neighbours.push((p, q, !intercept));
            }

            let mut improved = false;
            for (np, nq, nc) in neighbours {
                if np + nq > self.max_order {
                    continue;
                }
                if search.try_fit(np, nq, nc) {
                    improved = true;
                    break;
                }
            }
            if !improved || search.tried.len() >= search.max_models {
                break;
            }
        }

        let tried = search.trace.len();
        let model = search.best.ok_or(ForecastError::NoModel { tried })?;
        info!(
            order = %model.order(),
            with_intercept = model.with_intercept(),
            aic = model.aic(),
            tried,
            "best model selected"
        );
        Ok(AutoArimaFit {
            model,
            candidates: search.trace,
        })
    }
}
