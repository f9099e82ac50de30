//! Collector pipeline: fetch the export, clean it, upsert it into the warehouse.

use std::time::Instant;

use ibov_warehouse::{DateRange, Warehouse, WarehouseConfig};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::source::{CsvMarketSource, DEFAULT_SOURCE_URL};
use crate::{CoreError, TradingDate};

/// Label stored in `observations.source` and `ingest_log.source`.
pub const SOURCE_NAME: &str = "csv_export";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub source_url: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source_url: String::from(DEFAULT_SOURCE_URL),
        }
    }
}

/// Outcome of one collect cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub request_id: String,
    pub source_url: String,
    pub fetched_rows: usize,
    pub written_rows: usize,
    pub first_date: Option<TradingDate>,
    pub last_date: Option<TradingDate>,
    /// Rows stored for the fetched date range after the write.
    pub range_rows: u64,
    /// Rows stored in the whole table after the write.
    pub table_rows: u64,
    pub latency_ms: u64,
}

/// Runs collect cycles against one warehouse file.
///
/// The warehouse is opened read-write at the start of each write and dropped
/// at the end of the cycle, so the file lock is only held while writing.
pub struct Collector {
    source: CsvMarketSource,
    warehouse: WarehouseConfig,
}

impl Collector {
    pub fn new(source: CsvMarketSource, warehouse: WarehouseConfig) -> Self {
        Self { source, warehouse }
    }

    pub fn source(&self) -> &CsvMarketSource {
        &self.source
    }

    pub fn warehouse(&self) -> &WarehouseConfig {
        &self.warehouse
    }

    /// Run one fetch → clean → upsert cycle. Failures are returned as-is.
    pub async fn run(&self) -> Result<CollectReport, CoreError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        info!(%request_id, url = self.source.url(), "collect cycle started");

        let series = self.source.fetch().await?;
        let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

        let records = series.to_records();
        let first_date = series.first_date();
        let last_date = series.last_date();

        let config = self.warehouse.clone();
        let task_request_id = request_id.clone();
        let (written_rows, range_rows, table_rows) = tokio::task::spawn_blocking(move || {
            let warehouse = Warehouse::open(config)?;
            let written =
                warehouse.upsert_observations(SOURCE_NAME, &task_request_id, &records, latency_ms)?;
            let range_rows = match (records.first(), records.last()) {
                (Some(first), Some(last)) => warehouse.count_observations(Some(DateRange {
                    from: &first.trade_date,
                    to: &last.trade_date,
                }))?,
                _ => 0,
            };
            let table_rows = warehouse.count_observations(None)?;
            Ok::<_, ibov_warehouse::WarehouseError>((written, range_rows, table_rows))
        })
        .await
        .map_err(|error| CoreError::Join(error.to_string()))??;

        let report = CollectReport {
            request_id,
            source_url: self.source.url().to_string(),
            fetched_rows: series.len(),
            written_rows,
            first_date,
            last_date,
            range_rows,
            table_rows,
            latency_ms,
        };
        info!(
            request_id = %report.request_id,
            fetched = report.fetched_rows,
            written = report.written_rows,
            table_rows = report.table_rows,
            "collect cycle finished"
        );
        Ok(report)
    }
}
