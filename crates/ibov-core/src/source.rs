//! Market-data source: downloads the IBOVESPA CSV export and cleans it into an
//! [`ObservationSeries`].

use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::http_client::{HttpClient, HttpRequest, BROWSER_USER_AGENT};
use crate::{Observation, ObservationSeries, SourceError, TradingDate};

/// Public IBOVESPA daily export.
pub const DEFAULT_SOURCE_URL: &str =
    "https://storage.googleapis.com/ibovespa-data-tech-challenge/ibovespa/ibovespa_data.csv";

/// Target of the outbound connectivity probe.
pub const DEFAULT_CONNECTIVITY_URL: &str = "https://www.google.com";

pub const FETCH_TIMEOUT_MS: u64 = 10_000;
pub const CONNECTIVITY_TIMEOUT_MS: u64 = 5_000;

const DATE_HEADERS: &[&str] = &["date", "data", "price"];
const CLOSE_HEADERS: &[&str] = &["close", "fechamento"];
const OPEN_HEADERS: &[&str] = &["open", "abertura"];
const HIGH_HEADERS: &[&str] = &["high", "maximo", "máximo"];
const LOW_HEADERS: &[&str] = &["low", "minimo", "mínimo"];
const VOLUME_HEADERS: &[&str] = &["volume"];

/// Fetches the CSV export over HTTP.
#[derive(Clone)]
pub struct CsvMarketSource {
    client: Arc<dyn HttpClient>,
    url: String,
    timeout_ms: u64,
}

impl CsvMarketSource {
    pub fn new(client: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout_ms: FETCH_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the raw CSV body.
    pub async fn fetch_csv(&self) -> Result<String, SourceError> {
        let request = HttpRequest::get(self.url.as_str())
            .with_header("user-agent", BROWSER_USER_AGENT)
            .with_timeout_ms(self.timeout_ms);

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(SourceError::Unavailable {
                status: response.status,
                url: self.url.clone(),
            });
        }

        debug!(bytes = response.body.len(), url = %self.url, "market data downloaded");
        Ok(response.body)
    }

    /// Download and clean the export.
    pub async fn fetch(&self) -> Result<ObservationSeries, SourceError> {
        let body = self.fetch_csv().await?;
        parse_observations(&body)
    }
}

struct ColumnMap {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, SourceError> {
        let date = find_column(headers, DATE_HEADERS).ok_or_else(|| SourceError::Malformed {
            reason: String::from("missing Date column"),
        })?;
        let close = find_column(headers, CLOSE_HEADERS).ok_or_else(|| SourceError::Malformed {
            reason: String::from("missing Close column"),
        })?;

        Ok(Self {
            date,
            close,
            open: find_column(headers, OPEN_HEADERS),
            high: find_column(headers, HIGH_HEADERS),
            low: find_column(headers, LOW_HEADERS),
            volume: find_column(headers, VOLUME_HEADERS),
        })
    }
}

/// Aliases are tried in order, so `Date` wins over `Price` when both exist.
fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|header| header.trim().to_lowercase() == *alias)
    })
}

fn parse_number(record: &StringRecord, index: Option<usize>) -> Option<f64> {
    let raw = record.get(index?)?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Clean a CSV export into a sorted, date-unique series.
///
/// Rows with an unparseable date (including the `Ticker`/`Date` preamble rows
/// of multi-header exports) or an unusable close are dropped. Optional numeric
/// fields that fail to parse become `None`. Duplicate dates keep the last row.
pub fn parse_observations(csv_text: &str) -> Result<ObservationSeries, SourceError> {
    // Spreadsheet exports often lead with a UTF-8 byte order mark.
    let csv_text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut observations = Vec::new();
    let mut dropped = 0_usize;
    for record in reader.records() {
        let record = record?;

        let Some(date) = record
            .get(columns.date)
            .and_then(|raw| TradingDate::parse(raw).ok())
        else {
            dropped += 1;
            continue;
        };
        let Some(close) = parse_number(&record, Some(columns.close)) else {
            dropped += 1;
            continue;
        };

        match Observation::new(
            date,
            close,
            parse_number(&record, columns.open),
            parse_number(&record, columns.high),
            parse_number(&record, columns.low),
            parse_number(&record, columns.volume),
        ) {
            Ok(observation) => observations.push(observation),
            Err(error) => {
                debug!(%date, %error, "dropping invalid observation");
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, "dropped unusable CSV rows");
    }

    let parsed = observations.len();
    let series = ObservationSeries::from_unsorted(observations);
    if series.is_empty() {
        return Err(SourceError::Empty);
    }

    info!(
        parsed,
        unique = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "market data cleaned"
    );
    Ok(series)
}

/// Probe outbound connectivity; returns the HTTP status of a GET on `url`.
pub async fn check_connectivity(client: &dyn HttpClient, url: &str) -> Result<u16, SourceError> {
    let request = HttpRequest::get(url).with_timeout_ms(CONNECTIVITY_TIMEOUT_MS);
    let response = client.execute(request).await?;
    info!(url, status = response.status, "connectivity probe finished");
    Ok(response.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse, ScriptedHttpClient};

    const MULTI_HEADER_EXPORT: &str = "\
Price,Close,High,Low,Open,Volume
Ticker,^BVSP,^BVSP,^BVSP,^BVSP,^BVSP
Date,,,,,
2024-01-03,132834.0,134389.0,132600.0,134346.0,11200000
2024-01-02,134346.0,134389.0,132697.0,132697.0,10100000
2024-01-04,131226.0,132900.0,130800.0,132834.0,
";

    #[test]
    fn parses_multi_header_export_and_sorts() {
        let series = parse_observations(MULTI_HEADER_EXPORT).expect("parse");

        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), TradingDate::parse("2024-01-02").ok());
        assert_eq!(series.observations()[2].volume, None);
        assert_eq!(series.observations()[0].open, Some(132697.0));
    }

    #[test]
    fn leading_byte_order_mark_is_ignored() {
        let csv = "\u{feff}Date,Close\n2024-01-02,100\n2024-01-03,101\n";
        let series = parse_observations(csv).expect("parse");

        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), TradingDate::parse("2024-01-02").ok());
    }

    #[test]
    fn accepts_portuguese_headers_and_timestamps() {
        let csv = "Data,Fechamento,Abertura,Maximo,Minimo,Volume\n\
                   2024-01-02 00:00:00-03:00,100.5,99,101,98,n/a\n\
                   2024-01-02 00:00:00-03:00,100.7,99,101,98,5\n";
        let series = parse_observations(csv).expect("parse");

        assert_eq!(series.len(), 1);
        assert_eq!(series.closes(), vec![100.7]);
        assert_eq!(series.observations()[0].volume, Some(5.0));
    }

    #[test]
    fn drops_rows_with_bad_close() {
        let csv = "Date,Close\n2024-01-02,abc\n2024-01-03,-5\n2024-01-04,10\n";
        let series = parse_observations(csv).expect("parse");
        assert_eq!(series.closes(), vec![10.0]);
    }

    #[test]
    fn missing_columns_and_empty_payloads_are_errors() {
        assert!(matches!(
            parse_observations("Date,Open\n2024-01-02,1\n"),
            Err(SourceError::Malformed { .. })
        ));
        assert!(matches!(
            parse_observations("Date,Close\nfoo,bar\n"),
            Err(SourceError::Empty)
        ));
    }

    #[tokio::test]
    async fn fetch_sends_browser_user_agent_and_timeout() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok(
            MULTI_HEADER_EXPORT,
        ))]));
        let source = CsvMarketSource::new(client.clone(), "https://example.test/ibov.csv");

        let series = source.fetch().await.expect("fetch");
        assert_eq!(series.len(), 3);

        let requests = client.requests();
        assert_eq!(requests[0].timeout_ms, FETCH_TIMEOUT_MS);
        assert_eq!(
            requests[0].headers.get("user-agent").map(String::as_str),
            Some(BROWSER_USER_AGENT)
        );
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse {
            status: 404,
            body: String::from("not found"),
        })]));
        let source = CsvMarketSource::new(client, "https://example.test/missing.csv");

        let error = source.fetch().await.expect_err("should fail");
        assert!(matches!(error, SourceError::Unavailable { status: 404, .. }));
    }

    #[tokio::test]
    async fn connectivity_reports_status_or_transport_error() {
        let client = ScriptedHttpClient::new([
            Ok(HttpResponse {
                status: 301,
                body: String::new(),
            }),
            Err(HttpError::new("connection failed: dns")),
        ]);

        let status = check_connectivity(&client, DEFAULT_CONNECTIVITY_URL)
            .await
            .expect("status");
        assert_eq!(status, 301);
        assert_eq!(client.requests()[0].timeout_ms, CONNECTIVITY_TIMEOUT_MS);

        let error = check_connectivity(&client, DEFAULT_CONNECTIVITY_URL)
            .await
            .expect_err("transport");
        assert!(matches!(error, SourceError::Transport(_)));
    }
}
