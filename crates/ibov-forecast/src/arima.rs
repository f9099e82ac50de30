//! Non-seasonal ARIMA(p, d, q) estimated by conditional sum of squares.
//!
//! The model is fitted on the `d`-times differenced series `w`:
//!
//! ```text
//! (w_t - μ) = Σ φ_i (w_{t-i} - μ) + e_t + Σ θ_j e_{t-j}
//! ```
//!
//! Residuals are computed recursively from `t = p`, with pre-sample residuals
//! set to zero. Coefficients are kept inside `Σ|φ| < 1` and `Σ|θ| < 1`, which
//! is sufficient for stationarity and invertibility.

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::optimize::{nelder_mead, NelderMeadOptions};
use crate::ForecastError;

/// Iteration budget per free parameter for a cold fit.
const ITERATIONS_PER_PARAM: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Display for ArimaOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Estimated coefficients. `intercept` is the mean of the differenced series
/// and is zero when the model has no intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaParams {
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
}

/// One forecast step: point estimate plus symmetric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastValue {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaModel {
    order: ArimaOrder,
    with_intercept: bool,
    params: ArimaParams,
    sigma2: f64,
    log_likelihood: f64,
    aic: f64,
    nobs: usize,
    /// Series the model state is conditioned on, in original scale.
    history: Vec<f64>,
    /// In-sample one-step residuals on the differenced scale, from `t = p`.
    residuals: Vec<f64>,
}

impl ArimaModel {
    /// Fit `order` to `series` from a cold start.
    pub fn fit(series: &[f64], order: ArimaOrder, with_intercept: bool) -> Result<Self, ForecastError> {
        let budget = ITERATIONS_PER_PARAM * (free_params(order, with_intercept) + 1);
        Self::fit_from(series, order, with_intercept, None, budget)
    }

    /// Fit `order` to `series`, optionally warm-started from `start`.
    pub fn fit_from(
        series: &[f64],
        order: ArimaOrder,
        with_intercept: bool,
        start: Option<&ArimaParams>,
        max_iterations: usize,
    ) -> Result<Self, ForecastError> {
        validate_series(series)?;
        let needed = min_observations(order, with_intercept);
        if series.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let w = difference(series, order.d);
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let scale = std_dev(&w, mean).max(f64::EPSILON.sqrt());

        let layout = Layout {
            order,
            with_intercept,
            mean,
            scale,
        };
        let start_vector = layout.start_vector(start);

        let objective = |x: &[f64]| {
            let params = layout.unpack(x);
            if !within_bounds(&params.ar) || !within_bounds(&params.ma) {
                return f64::INFINITY;
            }
            let (_, ss) = css_residuals(&w, &params);
            ss / (scale * scale)
        };

        let minimum = nelder_mead(
            objective,
            &start_vector,
            NelderMeadOptions {
                max_iterations,
                ..NelderMeadOptions::default()
            },
        );
        if !minimum.value.is_finite() {
            return Err(ForecastError::FitFailed {
                order: order.to_string(),
                reason: String::from("objective did not reach a finite value"),
            });
        }

        let params = layout.unpack(&minimum.x);
        let (residuals, ss) = css_residuals(&w, &params);
        let nobs = residuals.len();
        let sigma2 = (ss / nobs as f64).max(f64::MIN_POSITIVE);
        let log_likelihood = -0.5 * nobs as f64 * ((2.0 * PI * sigma2).ln() + 1.0);
        let k = free_params(order, with_intercept) + 1;
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;

        Ok(Self {
            order,
            with_intercept,
            params,
            sigma2,
            log_likelihood,
            aic,
            nobs,
            history: series.to_vec(),
            residuals,
        })
    }

    /// Same coefficients conditioned on a different series. Fit statistics
    /// (`sigma2`, log-likelihood, AIC) still describe the original estimation.
    pub fn apply(&self, series: &[f64]) -> Result<Self, ForecastError> {
        validate_series(series)?;
        let needed = self.order.d + self.order.p + 1;
        if series.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let w = difference(series, self.order.d);
        let (residuals, _) = css_residuals(&w, &self.params);
        Ok(Self {
            history: series.to_vec(),
            residuals,
            ..self.clone()
        })
    }

    /// Re-estimate the same order on `series`, starting from the current
    /// coefficients, with at most `max_iterations` simplex steps.
    pub fn refit(&self, series: &[f64], max_iterations: usize) -> Result<Self, ForecastError> {
        Self::fit_from(
            series,
            self.order,
            self.with_intercept,
            Some(&self.params),
            max_iterations,
        )
    }

    /// Forecast `horizon` steps past the end of the conditioning series.
    pub fn forecast(&self, horizon: usize, confidence: f64) -> Result<Vec<ForecastValue>, ForecastError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ForecastError::InvalidParameter {
                name: "confidence",
                reason: format!("must be in (0, 1), got {confidence}"),
            });
        }
        if horizon == 0 {
            return Ok(Vec::new());
        }

        let ArimaOrder { p, d, q } = self.order;
        let levels = difference_levels(&self.history, d);
        let w = &levels[d];
        let mu = self.params.intercept;

        let mut w_ext = w.clone();
        let mut e_ext = vec![0.0; w.len().saturating_sub(self.residuals.len())];
        e_ext.extend_from_slice(&self.residuals);

        let mut means = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let t = w_ext.len();
            let mut prediction = mu;
            for i in 1..=p {
                prediction += self.params.ar[i - 1] * (w_ext[t - i] - mu);
            }
            for j in 1..=q.min(t) {
                prediction += self.params.ma[j - 1] * e_ext[t - j];
            }
            w_ext.push(prediction);
            e_ext.push(0.0);
            means.push(prediction);
        }

        for level in levels[..d].iter().rev() {
            let mut running = level.last().copied().unwrap_or_default();
            for value in means.iter_mut() {
                running += *value;
                *value = running;
            }
        }

        let psi = psi_weights(&self.params, d, horizon);
        let z = Normal::new(0.0, 1.0)?.inverse_cdf(0.5 + confidence / 2.0);
        let mut cumulative = 0.0;
        Ok(means
            .into_iter()
            .zip(psi)
            .map(|(mean, weight)| {
                cumulative += weight * weight;
                let half_width = z * (self.sigma2 * cumulative).sqrt();
                ForecastValue {
                    mean,
                    lower: mean - half_width,
                    upper: mean + half_width,
                }
            })
            .collect())
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn with_intercept(&self) -> bool {
        self.with_intercept
    }

    pub fn params(&self) -> &ArimaParams {
        &self.params
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Residual count used by the estimation.
    pub fn nobs(&self) -> usize {
        self.nobs
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }
}

/// Maps the optimizer's vector onto model coefficients. The intercept is
/// optimized in units of the differenced series' standard deviation.
struct Layout {
    order: ArimaOrder,
    with_intercept: bool,
    mean: f64,
    scale: f64,
}

impl Layout {
    fn offset(&self) -> usize {
        usize::from(self.with_intercept)
    }

    fn unpack(&self, x: &[f64]) -> ArimaParams {
        let offset = self.offset();
        ArimaParams {
            intercept: if self.with_intercept {
                self.mean + x[0] * self.scale
            } else {
                0.0
            },
            ar: x[offset..offset + self.order.p].to_vec(),
            ma: x[offset + self.order.p..offset + self.order.p + self.order.q].to_vec(),
        }
    }

    fn start_vector(&self, start: Option<&ArimaParams>) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.offset() + self.order.p + self.order.q);
        if self.with_intercept {
            x.push(match start {
                Some(params) => (params.intercept - self.mean) / self.scale,
                None => 0.0,
            });
        }
        let (ar, ma) = match start {
            Some(params) => (
                shrink_into_bounds(&params.ar, self.order.p),
                shrink_into_bounds(&params.ma, self.order.q),
            ),
            None => (vec![0.0; self.order.p], vec![0.0; self.order.q]),
        };
        x.extend(ar);
        x.extend(ma);
        x
    }
}

fn free_params(order: ArimaOrder, with_intercept: bool) -> usize {
    order.p + order.q + usize::from(with_intercept)
}

/// Smallest series length that leaves at least one residual degree of freedom
/// beyond the estimated parameters (including the innovation variance).
pub fn min_observations(order: ArimaOrder, with_intercept: bool) -> usize {
    order.d + order.p + free_params(order, with_intercept) + 2
}

fn validate_series(series: &[f64]) -> Result<(), ForecastError> {
    if series.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    if let Some(index) = series.iter().position(|value| !value.is_finite()) {
        return Err(ForecastError::InvalidParameter {
            name: "series",
            reason: format!("value at index {index} is not finite"),
        });
    }
    Ok(())
}

fn within_bounds(coefficients: &[f64]) -> bool {
    coefficients.iter().map(|c| c.abs()).sum::<f64>() < 1.0
}

/// Pad or truncate to `len` and pull the coefficients strictly inside the
/// admissible region.
fn shrink_into_bounds(coefficients: &[f64], len: usize) -> Vec<f64> {
    let mut out: Vec<f64> = coefficients.iter().copied().take(len).collect();
    out.resize(len, 0.0);
    let total: f64 = out.iter().map(|c| c.abs()).sum();
    if total >= 0.99 {
        let factor = 0.99 / total;
        out.iter_mut().for_each(|c| *c *= factor);
    }
    out
}

pub(crate) fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut current = series.to_vec();
    for _ in 0..d {
        current = current.windows(2).map(|pair| pair[1] - pair[0]).collect();
    }
    current
}

/// `levels[k]` is the series differenced `k` times.
fn difference_levels(series: &[f64], d: usize) -> Vec<Vec<f64>> {
    let mut levels = Vec::with_capacity(d + 1);
    levels.push(series.to_vec());
    for k in 0..d {
        let next = levels[k].windows(2).map(|pair| pair[1] - pair[0]).collect();
        levels.push(next);
    }
    levels
}

/// One-step residuals from `t = p` onward and their sum of squares.
fn css_residuals(w: &[f64], params: &ArimaParams) -> (Vec<f64>, f64) {
    let p = params.ar.len();
    let q = params.ma.len();
    let mu = params.intercept;
    let mut errors = vec![0.0; w.len()];
    let mut ss = 0.0;

    for t in p..w.len() {
        let mut prediction = mu;
        for i in 1..=p {
            prediction += params.ar[i - 1] * (w[t - i] - mu);
        }
        for j in 1..=q.min(t) {
            prediction += params.ma[j - 1] * errors[t - j];
        }
        let error = w[t] - prediction;
        errors[t] = error;
        ss += error * error;
    }

    errors.drain(..p.min(errors.len()));
    (errors, ss)
}

/// MA(∞) weights of `φ(B)(1 − B)^d y_t = θ(B) e_t`.
fn psi_weights(params: &ArimaParams, d: usize, horizon: usize) -> Vec<f64> {
    // φ(B)(1 − B)^d as coefficients of B^0, B^1, ...
    let mut polynomial = vec![1.0];
    polynomial.extend(params.ar.iter().map(|phi| -phi));
    for _ in 0..d {
        let mut next = vec![0.0; polynomial.len() + 1];
        for (k, coefficient) in polynomial.iter().enumerate() {
            next[k] += coefficient;
            next[k + 1] -= coefficient;
        }
        polynomial = next;
    }
    let phi_star: Vec<f64> = polynomial.iter().skip(1).map(|c| -c).collect();

    let mut psi = Vec::with_capacity(horizon);
    psi.push(1.0);
    for j in 1..horizon {
        let mut value = params.ma.get(j - 1).copied().unwrap_or(0.0);
        for i in 1..=phi_star.len().min(j) {
            value += phi_star[i - 1] * psi[j - i];
        }
        psi.push(value);
    }
    psi.truncate(horizon);
    psi
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// AR(1) with φ = 0.6 around 10, driven by a fixed pseudo-random sequence.
    fn ar1_series(n: usize) -> Vec<f64> {
        let mut state: u64 = 42;
        let mut next_noise = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
        };
        let mut y = vec![10.0];
        for _ in 1..n {
            let prev = *y.last().unwrap_or(&10.0);
            y.push(10.0 + 0.6 * (prev - 10.0) + next_noise());
        }
        y
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let series = ar1_series(400);
        let model = ArimaModel::fit(&series, ArimaOrder::new(1, 0, 0), true).expect("fit");

        assert!((model.params().ar[0] - 0.6).abs() < 0.1, "{:?}", model.params());
        assert!((model.params().intercept - 10.0).abs() < 0.1);
        assert_eq!(model.residuals().len(), 399);
        assert!(model.aic().is_finite());
    }

    #[test]
    fn random_walk_forecast_is_flat_with_widening_bounds() {
        let series = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0, 105.0];
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0), false).expect("fit");
        let forecast = model.forecast(3, 0.95).expect("forecast");

        assert_eq!(forecast.len(), 3);
        for point in &forecast {
            assert!((point.mean - 105.0).abs() < 1e-9);
        }
        let width = |f: &ForecastValue| f.upper - f.lower;
        assert!(width(&forecast[1]) > width(&forecast[0]));
        assert!(width(&forecast[2]) > width(&forecast[1]));
        // sqrt(2) growth for a random walk.
        assert!((width(&forecast[1]) / width(&forecast[0]) - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn drift_is_integrated_into_levels() {
        let series: Vec<f64> = (0..20).map(|i| 50.0 + 2.0 * i as f64).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0), true).expect("fit");
        let forecast = model.forecast(2, 0.95).expect("forecast");

        assert!((forecast[0].mean - 90.0).abs() < 1e-6);
        assert!((forecast[1].mean - 92.0).abs() < 1e-6);
    }

    #[test]
    fn psi_weights_of_integrated_ar1() {
        let params = ArimaParams {
            intercept: 0.0,
            ar: vec![0.5],
            ma: vec![],
        };
        // (1 - 0.5B)(1 - B) = 1 - 1.5B + 0.5B²
        let psi = psi_weights(&params, 1, 4);
        assert_eq!(psi.len(), 4);
        assert!((psi[1] - 1.5).abs() < 1e-12);
        assert!((psi[2] - 1.75).abs() < 1e-12);
        assert!((psi[3] - 1.875).abs() < 1e-12);
    }

    #[test]
    fn fitting_is_deterministic() {
        let series = ar1_series(200);
        let a = ArimaModel::fit(&series, ArimaOrder::new(1, 1, 1), true).expect("fit a");
        let b = ArimaModel::fit(&series, ArimaOrder::new(1, 1, 1), true).expect("fit b");
        assert_eq!(a, b);
    }

    #[test]
    fn coefficients_stay_in_admissible_region() {
        let series: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(2, 0, 1), true).expect("fit");
        assert!(within_bounds(&model.params().ar));
        assert!(within_bounds(&model.params().ma));
    }

    #[test]
    fn apply_keeps_coefficients_and_moves_origin() {
        let series = ar1_series(120);
        let model = ArimaModel::fit(&series[..100], ArimaOrder::new(1, 0, 0), true).expect("fit");
        let applied = model.apply(&series).expect("apply");

        assert_eq!(applied.params(), model.params());
        assert_eq!(applied.history().len(), 120);
        assert_eq!(applied.residuals().len(), 119);
        assert_ne!(
            applied.forecast(1, 0.95).expect("a")[0].mean,
            model.forecast(1, 0.95).expect("b")[0].mean
        );
    }

    #[test]
    fn refit_does_not_worsen_warm_start() {
        let series = ar1_series(150);
        let model = ArimaModel::fit(&series[..100], ArimaOrder::new(1, 0, 0), true).expect("fit");
        let refitted = model.refit(&series, 50).expect("refit");
        let applied = model.apply(&series).expect("apply");

        let ss = |m: &ArimaModel| m.residuals().iter().map(|e| e * e).sum::<f64>();
        assert!(ss(&refitted) <= ss(&applied) + 1e-9);
    }

    #[test]
    fn rejects_short_or_non_finite_input() {
        assert!(matches!(
            ArimaModel::fit(&[1.0, 2.0], ArimaOrder::new(1, 1, 1), true),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(matches!(
            ArimaModel::fit(&[1.0, f64::NAN, 3.0, 4.0], ArimaOrder::new(0, 0, 0), true),
            Err(ForecastError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_invalid_confidence() {
        let model =
            ArimaModel::fit(&[1.0, 2.0, 3.0, 4.0, 5.0], ArimaOrder::new(0, 0, 0), true).expect("fit");
        assert!(model.forecast(1, 1.0).is_err());
        assert!(model.forecast(0, 0.95).expect("empty").is_empty());
    }
}
