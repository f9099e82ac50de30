//! Forecast dashboard: stateless per request, reads the stored artifact and
//! the warehouse history, renders HTML with inline SVG.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use ibov_core::{ObservationSeries, TradingDate};
use ibov_forecast::{
    next_business_days, regularize_business_days, AccuracyReport, ArimaModel, ArimaOrder, ArtifactStore,
    ForecastError, Histogram, ResidualDiagnostics, DEFAULT_CONFIDENCE,
};
use ibov_warehouse::{Warehouse, WarehouseConfig};

use crate::render::{self, Band, Line, BLUE, GREY, RED};
use crate::WebError;

pub const HORIZON_RANGE: (i64, i64, i64) = (10, 180, 10);
pub const HISTORY_RANGE: (i64, i64, i64) = (50, 500, 50);
pub const DEFAULT_HORIZON: usize = 60;
pub const DEFAULT_HISTORY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardConfig {
    /// Business days held out for the accuracy check.
    pub test_size: usize,
    pub confidence: f64,
    /// Simplex iterations allowed when updating the model.
    pub refit_iterations: usize,
    pub histogram_bins: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            test_size: 30,
            confidence: DEFAULT_CONFIDENCE,
            refit_iterations: 50,
            histogram_bins: 50,
        }
    }
}

/// Shared state of the dashboard service. The warehouse is opened read-only
/// per request, so a running collector can still take its write lock between
/// requests.
pub struct DashboardState {
    pub warehouse: WarehouseConfig,
    pub store: ArtifactStore,
    pub config: DashboardConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub horizon: Option<i64>,
    pub history: Option<i64>,
    pub update: Option<String>,
    /// Inclusive bounds of the processed-history chart (`YYYY-MM-DD`).
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Validated request settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardSettings {
    pub horizon: usize,
    pub history: usize,
    pub update: bool,
    pub from: Option<TradingDate>,
    pub to: Option<TradingDate>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            history: DEFAULT_HISTORY,
            update: true,
            from: None,
            to: None,
        }
    }
}

impl DashboardSettings {
    /// Clamp numeric parameters into their slider ranges and parse `update`.
    pub fn from_query(query: &DashboardQuery) -> Result<Self, WebError> {
        let defaults = Self::default();
        let update = match query.update.as_deref().map(str::trim) {
            None | Some("") => defaults.update,
            Some(value) => parse_flag(value).ok_or_else(|| {
                WebError::BadRequest(format!("update must be true or false, got '{value}'"))
            })?,
        };
        let from = parse_bound(query.from.as_deref(), "from")?;
        let to = parse_bound(query.to.as_deref(), "to")?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(WebError::BadRequest(format!("from {from} is after to {to}")));
            }
        }
        Ok(Self {
            horizon: query
                .horizon
                .map_or(defaults.horizon, |value| snap(value, HORIZON_RANGE)),
            history: query
                .history
                .map_or(defaults.history, |value| snap(value, HISTORY_RANGE)),
            update,
            from,
            to,
        })
    }
}

fn parse_bound(value: Option<&str>, name: &str) -> Result<Option<TradingDate>, WebError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => TradingDate::parse(value)
            .map(Some)
            .map_err(|err| WebError::BadRequest(format!("{name}: {err}"))),
    }
}

fn snap(value: i64, (min, max, step): (i64, i64, i64)) -> usize {
    let clamped = value.clamp(min, max);
    let snapped = min + (clamped - min) / step * step;
    usize::try_from(snapped).unwrap_or_default()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: TradingDate,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestPoint {
    pub date: TradingDate,
    pub actual: f64,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// What happened to the stored model before forecasting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ModelUpdate {
    Refitted,
    Disabled,
    /// No hold-out split, so there is nothing to update on.
    NotEnoughData,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub order: ArimaOrder,
    pub with_intercept: bool,
    pub aic: f64,
    pub trained_at: String,
    pub training_rows: usize,
    pub update: ModelUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualView {
    pub values: Vec<f64>,
    pub diagnostics: Option<ResidualDiagnostics>,
    pub histogram: Option<Histogram>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestEvaluation {
    pub points: Vec<TestPoint>,
    pub accuracy: Option<AccuracyReport>,
}

/// Everything the page shows, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub settings: DashboardSettings,
    pub confidence: f64,
    pub model: ModelInfo,
    pub processed: ObservationSeries,
    pub filled_days: usize,
    /// `(train, test)` sizes when a hold-out split was possible.
    pub split: Option<(usize, usize)>,
    pub forecast: Vec<ForecastPoint>,
    pub residuals: ResidualView,
    pub evaluation: Option<TestEvaluation>,
}

/// Load, update, forecast and evaluate. Blocking.
pub fn build_view(
    warehouse: &Warehouse,
    store: &ArtifactStore,
    config: &DashboardConfig,
    settings: DashboardSettings,
) -> Result<DashboardView, WebError> {
    let artifact = store.load()?;
    info!(
        order = %artifact.model.order(),
        trained_at = %artifact.trained_at,
        "model artifact loaded"
    );

    let records = warehouse.load_history(None)?;
    let raw = ObservationSeries::from_records(&records).map_err(ForecastError::from)?;
    if raw.is_empty() {
        return Err(ForecastError::EmptyHistory.into());
    }
    let regularized = regularize_business_days(&raw);
    let processed = regularized.series;
    let closes = processed.closes();
    info!(
        rows = processed.len(),
        filled = regularized.filled,
        "history processed"
    );

    let split = (processed.len() > config.test_size).then(|| processed.split_last(config.test_size));

    let mut model = artifact.model.clone();
    let update = match (&split, settings.update) {
        (None, _) => ModelUpdate::NotEnoughData,
        (Some(_), false) => ModelUpdate::Disabled,
        (Some((train, _)), true) => match model.refit(&train.closes(), config.refit_iterations) {
            Ok(refitted) => {
                info!(order = %refitted.order(), aic = refitted.aic(), "model updated with recent data");
                model = refitted;
                ModelUpdate::Refitted
            }
            Err(err) => {
                warn!(error = %err, "model update failed; using the stored model");
                ModelUpdate::Failed(err.to_string())
            }
        },
    };

    let forecast = forecast_points(&model.apply(&closes)?, &processed, settings.horizon, config.confidence)?;

    let residual_values = model.residuals().to_vec();
    let diagnostics = match ResidualDiagnostics::compute(&residual_values) {
        Ok(diagnostics) => Some(diagnostics),
        Err(err) => {
            warn!(error = %err, "residual diagnostics skipped");
            None
        }
    };
    let histogram = Histogram::build(&residual_values, config.histogram_bins);

    let evaluation = match &split {
        Some((train, test)) => {
            let conditioned = model.apply(&train.closes())?;
            let predicted = conditioned.forecast(test.len(), config.confidence)?;
            let actual = test.closes();
            let points = test
                .observations()
                .iter()
                .zip(&predicted)
                .map(|(obs, value)| TestPoint {
                    date: obs.date,
                    actual: obs.close,
                    predicted: value.mean,
                    lower: value.lower,
                    upper: value.upper,
                })
                .collect();
            let means: Vec<f64> = predicted.iter().map(|value| value.mean).collect();
            Some(TestEvaluation {
                points,
                accuracy: AccuracyReport::evaluate(&actual, &means),
            })
        }
        None => None,
    };

    Ok(DashboardView {
        settings,
        confidence: config.confidence,
        model: ModelInfo {
            order: model.order(),
            with_intercept: model.with_intercept(),
            aic: model.aic(),
            trained_at: artifact.trained_at,
            training_rows: artifact.training_rows,
            update,
        },
        filled_days: regularized.filled,
        split: split.as_ref().map(|(train, test)| (train.len(), test.len())),
        processed,
        forecast,
        residuals: ResidualView {
            values: residual_values,
            diagnostics,
            histogram,
        },
        evaluation,
    })
}

fn forecast_points(
    model: &ArimaModel,
    series: &ObservationSeries,
    horizon: usize,
    confidence: f64,
) -> Result<Vec<ForecastPoint>, WebError> {
    let Some(last) = series.last_date() else {
        return Err(ForecastError::EmptyHistory.into());
    };
    let values = model.forecast(horizon, confidence)?;
    Ok(next_business_days(last, horizon)
        .into_iter()
        .zip(values)
        .map(|(date, value)| ForecastPoint {
            date,
            mean: value.mean,
            lower: value.lower,
            upper: value.upper,
        })
        .collect())
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/api/forecast", get(api_forecast))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn load_view(state: Arc<DashboardState>, query: &DashboardQuery) -> Result<DashboardView, WebError> {
    let settings = DashboardSettings::from_query(query)?;
    tokio::task::spawn_blocking(move || {
        let warehouse = Warehouse::open_read_only(state.warehouse.clone())?;
        build_view(&warehouse, &state.store, &state.config, settings)
    })
    .await?
}

async fn page(State(state): State<Arc<DashboardState>>, Query(query): Query<DashboardQuery>) -> Response {
    match load_view(state, &query).await {
        Ok(view) => Html(render_page(&view)).into_response(),
        Err(err) => {
            error!(error = %err, "dashboard render failed");
            (err.status(), Html(render_error_page(&err.to_string()))).into_response()
        }
    }
}

/// Body of `GET /api/forecast`.
#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub order: ArimaOrder,
    pub horizon: usize,
    pub update: ModelUpdate,
    pub last_observation: Option<TradingDate>,
    pub points: Vec<ForecastPoint>,
}

async fn api_forecast(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ForecastResponse>, WebError> {
    let view = load_view(state, &query).await?;
    Ok(Json(ForecastResponse {
        order: view.model.order,
        horizon: view.settings.horizon,
        update: view.model.update,
        last_observation: view.processed.last_date(),
        points: view.forecast,
    }))
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0 auto;max-width:1000px;padding:1rem;color:#212529}\
section{border-top:1px solid #dee2e6;padding:0.5rem 0}\
table{border-collapse:collapse;font-size:0.85rem}td,th{padding:2px 8px;text-align:right;border-bottom:1px solid #f1f3f5}\
svg{width:100%;height:auto}.note{color:#6c757d}.banner{padding:0.75rem;border-radius:4px}\
.ok{background:#d1e7dd}.warn{background:#fff3cd}.error{background:#f8d7da}\
.metrics span{display:inline-block;margin-right:2rem}.legend span{margin-right:1rem;font-size:0.85rem}";

fn page_shell(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>IBOVESPA ARIMA forecast</title><style>{STYLE}</style></head>\
         <body><h1>IBOVESPA: analysis and ARIMA forecast</h1>{body}</body></html>"
    )
}

pub fn render_error_page(message: &str) -> String {
    page_shell(&format!(
        "<div class=\"banner error\"><strong>Dashboard unavailable.</strong> {}</div>\
         <p class=\"note\">Run the collector and the trainer, then reload this page.</p>",
        render::escape_html(message)
    ))
}

fn day_number(date: TradingDate) -> f64 {
    f64::from(date.into_inner().to_julian_day())
}

pub fn render_page(view: &DashboardView) -> String {
    let mut body = String::new();
    body.push_str(&settings_section(&view.settings));
    body.push_str(&model_section(&view.model));
    body.push_str(&history_section(view));
    body.push_str(&split_section(view));
    body.push_str(&forecast_section(view));
    body.push_str(&residual_section(&view.residuals));
    body.push_str(&evaluation_section(view.evaluation.as_ref()));
    page_shell(&body)
}

fn options(range: (i64, i64, i64), selected: usize) -> String {
    let (min, max, step) = range;
    let mut html = String::new();
    let mut value = min;
    while value <= max {
        let mark = if usize::try_from(value).ok() == Some(selected) { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{value}\"{mark}>{value}</option>"));
        value += step;
    }
    html
}

fn settings_section(settings: &DashboardSettings) -> String {
    let (update_yes, update_no) = if settings.update { (" selected", "") } else { ("", " selected") };
    let from = settings.from.map(|d| d.to_string()).unwrap_or_default();
    let to = settings.to.map(|d| d.to_string()).unwrap_or_default();
    format!(
        "<section><h2>1. Configuration</h2><form method=\"get\" action=\"\">\
         <label>Business days to forecast <select name=\"horizon\">{}</select></label> \
         <label>History days on the chart <select name=\"history\">{}</select></label> \
         <label>Update model with recent data <select name=\"update\">\
         <option value=\"true\"{update_yes}>yes</option><option value=\"false\"{update_no}>no</option>\
         </select></label> \
         <label>History from <input type=\"date\" name=\"from\" value=\"{from}\"></label> \
         <label>to <input type=\"date\" name=\"to\" value=\"{to}\"></label> \
         <button type=\"submit\">Apply</button></form></section>",
        options(HORIZON_RANGE, settings.horizon),
        options(HISTORY_RANGE, settings.history),
    )
}

fn model_section(model: &ModelInfo) -> String {
    let update = match &model.update {
        ModelUpdate::Refitted => {
            String::from("<div class=\"banner ok\">Model updated with the training data.</div>")
        }
        ModelUpdate::Disabled => String::from(
            "<div class=\"banner warn\">Model not updated; forecasts use the stored coefficients.</div>",
        ),
        ModelUpdate::NotEnoughData => String::from(
            "<div class=\"banner warn\">Not enough data for a test split; the model is used as stored.</div>",
        ),
        ModelUpdate::Failed(reason) => format!(
            "<div class=\"banner warn\">Model update failed: {}. Forecasts use the stored model.</div>",
            render::escape_html(reason)
        ),
    };
    format!(
        "<section><h2>2. Model</h2><p class=\"metrics\"><span><b>Order</b> {}</span>\
         <span><b>Intercept</b> {}</span><span><b>AIC</b> {}</span>\
         <span><b>Trained at</b> {}</span><span><b>Training rows</b> {}</span></p>{update}</section>",
        model.order,
        if model.with_intercept { "yes" } else { "no" },
        render::format_number(model.aic),
        render::escape_html(&model.trained_at),
        model.training_rows,
    )
}

/// The processed series limited to the requested `from`/`to` window.
fn visible_history(view: &DashboardView) -> ObservationSeries {
    let series = &view.processed;
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return ObservationSeries::default();
    };
    let from = view.settings.from.unwrap_or(first);
    let to = view.settings.to.unwrap_or(last);
    series.range(from, to).unwrap_or_default()
}

fn history_section(view: &DashboardView) -> String {
    let series = &visible_history(view);
    let first = series.first_date().map(|d| d.to_string()).unwrap_or_default();
    let last = series.last_date().map(|d| d.to_string()).unwrap_or_default();
    let chart = render::line_chart(
        "Processed IBOVESPA history",
        (&first, &last),
        &[Line {
            label: String::from("Close"),
            color: BLUE,
            dashed: false,
            points: series
                .observations()
                .iter()
                .map(|obs| (day_number(obs.date), obs.close))
                .collect(),
        }],
        &[],
    );

    let mut rows = String::new();
    for obs in series.tail(5).observations() {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            obs.date,
            render::format_number(obs.close)
        ));
    }
    format!(
        "<section><h2>3. Processed data</h2><p><b>Period:</b> {first} to {last} \
         ({} of {} business days shown, {} filled)</p>{chart}\
         <table><thead><tr><th>Date</th><th>Close</th></tr></thead><tbody>{rows}</tbody></table></section>",
        series.len(),
        view.processed.len(),
        view.filled_days,
    )
}

fn split_section(view: &DashboardView) -> String {
    let note = match view.split {
        Some((train, test)) => format!(
            "<p>Data split: <b>{train}</b> observations for fitting and updating the model, \
             <b>{test}</b> held out for testing.</p>"
        ),
        None => String::from(
            "<div class=\"banner warn\">Not enough data for a test set. The model is not evaluated \
             and the forecast uses all available data.</div>",
        ),
    };
    format!("<section><h2>4. Forecast preparation</h2>{note}</section>")
}

fn forecast_section(view: &DashboardView) -> String {
    let horizon = view.settings.horizon;
    let history = view.processed.tail(view.settings.history);
    let first = history.first_date().map(|d| d.to_string()).unwrap_or_default();
    let last = view.forecast.last().map(|p| p.date.to_string()).unwrap_or_default();
    let percent = (view.confidence * 100.0).round();

    let chart = render::line_chart(
        &format!("ARIMA forecast for the next {horizon} business days"),
        (&first, &last),
        &[
            Line {
                label: format!("History ({} days)", history.len()),
                color: BLUE,
                dashed: false,
                points: history
                    .observations()
                    .iter()
                    .map(|obs| (day_number(obs.date), obs.close))
                    .collect(),
            },
            Line {
                label: format!("Forecast ({horizon} days)"),
                color: RED,
                dashed: true,
                points: view
                    .forecast
                    .iter()
                    .map(|p| (day_number(p.date), p.mean))
                    .collect(),
            },
        ],
        &[Band {
            label: format!("{percent}% confidence interval"),
            color: RED,
            points: view
                .forecast
                .iter()
                .map(|p| (day_number(p.date), p.lower, p.upper))
                .collect(),
        }],
    );

    let mut rows = String::new();
    for point in &view.forecast {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            point.date,
            render::format_number(point.mean),
            render::format_number(point.lower),
            render::format_number(point.upper),
        ));
    }
    format!(
        "<section><h2>5. Forecast</h2>{chart}<details><summary>Forecast table</summary>\
         <table><thead><tr><th>Date</th><th>Forecast</th><th>Lower {percent}%</th><th>Upper {percent}%</th></tr></thead>\
         <tbody>{rows}</tbody></table></details></section>"
    )
}

fn residual_section(residuals: &ResidualView) -> String {
    let chart = residuals
        .histogram
        .as_ref()
        .map(|histogram| render::histogram_chart("Distribution of model residuals", histogram))
        .unwrap_or_default();
    let metrics = match &residuals.diagnostics {
        Some(diag) => {
            let verdict = if diag.looks_normal {
                "<div class=\"banner ok\">Jarque–Bera (p &gt; 0.05): residuals are not significantly \
                 different from a normal distribution.</div>"
            } else {
                "<div class=\"banner warn\">Jarque–Bera (p &le; 0.05): residuals may not be normal; \
                 the model may not capture all structure in the data.</div>"
            };
            format!(
                "<p class=\"metrics\"><span><b>Mean</b> {}</span><span><b>Std. dev.</b> {}</span>\
                 <span><b>Normality p-value</b> {:.3}</span></p>{verdict}",
                render::format_number(diag.mean),
                render::format_number(diag.std_dev),
                diag.p_value,
            )
        }
        None => String::from(
            "<div class=\"banner warn\">Not enough residuals for statistical tests.</div>",
        ),
    };
    format!(
        "<section><h2>6. Residual analysis</h2><p class=\"note\">Residuals are the in-sample \
         one-step errors of the fitted model.</p>{chart}{metrics}</section>"
    )
}

fn evaluation_section(evaluation: Option<&TestEvaluation>) -> String {
    let Some(evaluation) = evaluation else {
        return String::from(
            "<section><h2>7. Test-set accuracy</h2><div class=\"banner warn\">Accuracy not evaluated: \
             not enough data for a test set.</div></section>",
        );
    };

    let metrics = match &evaluation.accuracy {
        Some(report) => {
            let class = if report.accuracy >= 85.0 { "ok" } else { "warn" };
            format!(
                "<p class=\"metrics\"><span><b>MAPE</b> {:.2}%</span><span><b>Accuracy</b> {:.2}%</span></p>\
                 <div class=\"banner {class}\">Accuracy of {:.2}% on the test set is rated <b>{}</b>.</div>",
                report.mape, report.accuracy, report.accuracy, report.rating,
            )
        }
        None => String::from("<p class=\"metrics\"><span><b>MAPE</b> N/A</span><span><b>Accuracy</b> N/A</span></p>"),
    };

    let first = evaluation.points.first().map(|p| p.date.to_string()).unwrap_or_default();
    let last = evaluation.points.last().map(|p| p.date.to_string()).unwrap_or_default();
    let chart = render::line_chart(
        "Actual vs. predicted on the test set",
        (&first, &last),
        &[
            Line {
                label: String::from("Actual"),
                color: BLUE,
                dashed: false,
                points: evaluation
                    .points
                    .iter()
                    .map(|p| (day_number(p.date), p.actual))
                    .collect(),
            },
            Line {
                label: String::from("Predicted"),
                color: GREY,
                dashed: true,
                points: evaluation
                    .points
                    .iter()
                    .map(|p| (day_number(p.date), p.predicted))
                    .collect(),
            },
        ],
        &[Band {
            label: String::from("Confidence interval (test)"),
            color: RED,
            points: evaluation
                .points
                .iter()
                .map(|p| (day_number(p.date), p.lower, p.upper))
                .collect(),
        }],
    );

    let mut rows = String::new();
    for point in &evaluation.points {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            point.date,
            render::format_number(point.actual),
            render::format_number(point.predicted),
            render::format_number(point.lower),
            render::format_number(point.upper),
        ));
    }
    format!(
        "<section><h2>7. Test-set accuracy</h2>{metrics}{chart}<details><summary>Comparison table</summary>\
         <table><thead><tr><th>Date</th><th>Actual</th><th>Predicted</th><th>Lower</th><th>Upper</th></tr></thead>\
         <tbody>{rows}</tbody></table></details></section>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn query(horizon: Option<i64>, history: Option<i64>, update: Option<&str>) -> DashboardQuery {
        DashboardQuery {
            horizon,
            history,
            update: update.map(String::from),
            ..DashboardQuery::default()
        }
    }

    #[test]
    fn settings_default_when_absent() {
        let settings = DashboardSettings::from_query(&DashboardQuery::default()).expect("settings");
        assert_eq!(settings, DashboardSettings::default());
        assert_eq!(settings.horizon, 60);
        assert_eq!(settings.history, 200);
        assert!(settings.update);
    }

    #[test]
    fn settings_are_clamped_to_slider_steps() {
        let settings =
            DashboardSettings::from_query(&query(Some(1_000), Some(-5), Some("false"))).expect("settings");
        assert_eq!(settings.horizon, 180);
        assert_eq!(settings.history, 50);
        assert!(!settings.update);

        let settings = DashboardSettings::from_query(&query(Some(37), Some(260), Some("on"))).expect("settings");
        assert_eq!(settings.horizon, 30);
        assert_eq!(settings.history, 250);
        assert!(settings.update);
    }

    #[test]
    fn invalid_update_flag_is_rejected() {
        let error = DashboardSettings::from_query(&query(None, None, Some("maybe"))).expect_err("invalid");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn date_window_is_parsed_and_ordered() {
        let window = DashboardQuery {
            from: Some(String::from("2024-02-01")),
            to: Some(String::from("2024-03-01")),
            ..DashboardQuery::default()
        };
        let settings = DashboardSettings::from_query(&window).expect("settings");
        assert_eq!(settings.from, TradingDate::parse("2024-02-01").ok());
        assert_eq!(settings.to, TradingDate::parse("2024-03-01").ok());

        let reversed = DashboardQuery {
            from: Some(String::from("2024-03-01")),
            to: Some(String::from("2024-02-01")),
            ..DashboardQuery::default()
        };
        assert!(DashboardSettings::from_query(&reversed).is_err());

        let garbage = DashboardQuery {
            from: Some(String::from("yesterday")),
            ..DashboardQuery::default()
        };
        assert!(DashboardSettings::from_query(&garbage).is_err());
    }

    #[test]
    fn horizon_options_mark_selection() {
        let html = options(HORIZON_RANGE, 60);
        assert_eq!(html.matches("<option").count(), 18);
        assert!(html.contains("<option value=\"60\" selected>60</option>"));
    }

    #[tokio::test]
    async fn missing_artifact_renders_error_banner() {
        let temp = tempdir().expect("tempdir");
        let config = WarehouseConfig::in_home(temp.path());
        drop(Warehouse::open(config.clone()).expect("create"));
        let app = router(DashboardState {
            warehouse: config,
            store: ArtifactStore::new(temp.path().join("artifacts")),
            config: DashboardConfig::default(),
        });

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("class=\"banner error\""));
        assert!(html.contains("model artifact not found"));
    }

    #[tokio::test]
    async fn missing_warehouse_is_reported_as_json_error() {
        let temp = tempdir().expect("tempdir");
        let app = router(DashboardState {
            warehouse: WarehouseConfig::in_home(temp.path()),
            store: ArtifactStore::new(temp.path().join("artifacts")),
            config: DashboardConfig::default(),
        });

        let response = app
            .oneshot(Request::builder().uri("/api/forecast").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert!(json["error"].as_str().unwrap_or_default().contains("warehouse not found"));
        assert!(!WarehouseConfig::in_home(temp.path()).db_path.exists());
    }
}
