//! # ibov warehouse
//!
//! DuckDB-backed storage for daily IBOVESPA price observations.
//!
//! The collector upserts observations keyed by trading date; the trainer and
//! the dashboard read them back through the `vw_observations_history` view.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `observations` | One row per trading date (close, optional OHLV) |
//! | `ingest_log` | One row per collector batch |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_observations_history` | Non-null closes up to today, ascending |
//! | `vw_daily_returns` | Close-to-close returns |
//!
//! ## Locking
//!
//! DuckDB locks the database file for as long as a handle is open: a
//! read-write handle excludes every other process. Long-running services keep
//! a [`WarehouseConfig`] and open a [`Warehouse`] per cycle or per request,
//! using [`Warehouse::open_read_only`] when they only read.
//!
//! ```rust,no_run
//! use ibov_warehouse::{ObservationRecord, Warehouse, WarehouseConfig};
//!
//! let warehouse = Warehouse::open_default()?;
//! warehouse.upsert_observations(
//!     "csv",
//!     "req-0001",
//!     &[ObservationRecord::close_only("2024-01-02", 132_697.0)],
//!     120,
//! )?;
//! drop(warehouse);
//!
//! let reader = Warehouse::open_read_only(WarehouseConfig::default())?;
//! let history = reader.load_history(None)?;
//! # Ok::<(), ibov_warehouse::WarehouseError>(())
//! ```

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

/// Dataset name recorded in `ingest_log` for observation batches.
pub const OBSERVATIONS_DATASET: &str = "observations";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Read-only open of a database file that does not exist yet.
    #[error("warehouse not found at {path}; run a collect cycle first")]
    NotFound { path: PathBuf },

    /// Write attempted through a read-only handle.
    #[error("warehouse at {path} is open read-only")]
    ReadOnly { path: PathBuf },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_ibov_home())
    }
}

impl WarehouseConfig {
    /// Default layout under a data root: `<home>/warehouse/ibovespa.duckdb`.
    pub fn in_home(home: impl AsRef<Path>) -> Self {
        Self {
            db_path: home.as_ref().join("warehouse").join("ibovespa.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// One stored price observation.
///
/// `trade_date` is an ISO-8601 calendar date (`YYYY-MM-DD`); the domain layer
/// validates it before anything reaches the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub trade_date: String,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl ObservationRecord {
    /// Record carrying only the closing price.
    pub fn close_only(trade_date: impl Into<String>, close: f64) -> Self {
        Self {
            trade_date: trade_date.into(),
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// One collector batch as recorded in `ingest_log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestEntry {
    pub request_id: String,
    pub source: String,
    pub row_count: i64,
    pub latency_ms: Option<i64>,
    pub timestamp: String,
}

/// Snapshot of what the warehouse holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseStatus {
    pub db_path: PathBuf,
    pub observations: u64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub last_close: Option<f64>,
    /// Close-to-close return of the latest trading date, as a fraction.
    pub last_return: Option<f64>,
    /// Most recent batches first.
    pub recent_ingests: Vec<IngestEntry>,
}

/// Inclusive trading-date range (`YYYY-MM-DD` bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

/// The warehouse handle. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse read-write, creating the database file and schema if
    /// needed. The handle holds an exclusive file lock until it is dropped.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open an existing warehouse with a shared, engine-enforced read-only lock.
    ///
    /// The schema is not touched; it is created by the first read-write open.
    pub fn open_read_only(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if !config.db_path.is_file() {
            return Err(WarehouseError::NotFound {
                path: config.db_path,
            });
        }

        let manager = DuckDbConnectionManager::open_with_mode(
            config.db_path.clone(),
            config.max_pool_size,
            AccessMode::ReadOnly,
        )?;
        debug!(db_path = %config.db_path.display(), "warehouse opened read-only");
        Ok(Self { config, manager })
    }

    /// Apply migrations and (re)create views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn is_read_only(&self) -> bool {
        self.manager.mode() == AccessMode::ReadOnly
    }

    /// Insert or replace observations keyed by trading date, in one transaction.
    ///
    /// Re-ingesting the same dates leaves the row count unchanged. An empty
    /// batch is a no-op and writes nothing to `ingest_log`.
    pub fn upsert_observations(
        &self,
        source: &str,
        request_id: &str,
        rows: &[ObservationRecord],
        latency_ms: u64,
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        if self.is_read_only() {
            return Err(WarehouseError::ReadOnly {
                path: self.db_path().to_path_buf(),
            });
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                let params: [&dyn ToSql; 7] = [
                    &row.trade_date,
                    &row.close,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.volume,
                    &source,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO observations \
                     (trade_date, close, open, high, low, volume, source, updated_at) \
                     VALUES (CAST(? AS DATE), ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            let row_count = rows.len() as i64;
            let latency_ms = i64::try_from(latency_ms).unwrap_or(i64::MAX);
            let params: [&dyn ToSql; 5] = [
                &request_id,
                &source,
                &OBSERVATIONS_DATASET,
                &row_count,
                &latency_ms,
            ];
            connection.execute(
                "INSERT INTO ingest_log \
                 (request_id, source, dataset, status, row_count, latency_ms, timestamp) \
                 VALUES (?, ?, ?, 'ok', ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            Ok(rows.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        info!(written, source, request_id, "observations upserted");
        Ok(written)
    }

    /// Load the observation history, oldest first, optionally limited to a range.
    pub fn load_history(
        &self,
        range: Option<DateRange<'_>>,
    ) -> Result<Vec<ObservationRecord>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let base = "SELECT CAST(trade_date AS VARCHAR), close, open, high, low, volume \
                    FROM vw_observations_history";

        let map_row = |row: &::duckdb::Row<'_>| -> Result<ObservationRecord, ::duckdb::Error> {
            Ok(ObservationRecord {
                trade_date: row.get(0)?,
                close: row.get(1)?,
                open: row.get(2)?,
                high: row.get(3)?,
                low: row.get(4)?,
                volume: row.get(5)?,
            })
        };

        let records = match range {
            Some(range) => {
                let sql = format!(
                    "{base} WHERE trade_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE) \
                     ORDER BY trade_date ASC"
                );
                let mut statement = connection.prepare(sql.as_str())?;
                let params: [&dyn ToSql; 2] = [&range.from, &range.to];
                let rows = statement.query_map(params.as_slice(), map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{base} ORDER BY trade_date ASC");
                let mut statement = connection.prepare(sql.as_str())?;
                let rows = statement.query_map([], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        debug!(rows = records.len(), "observation history loaded");
        Ok(records)
    }

    /// Count stored observations, optionally within an inclusive date range.
    pub fn count_observations(&self, range: Option<DateRange<'_>>) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let count: i64 = match range {
            Some(range) => {
                let params: [&dyn ToSql; 2] = [&range.from, &range.to];
                connection.query_row(
                    "SELECT COUNT(*) FROM observations \
                     WHERE trade_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)",
                    params.as_slice(),
                    |row| row.get(0),
                )?
            }
            None => connection.query_row("SELECT COUNT(*) FROM observations", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count.max(0) as u64)
    }

    /// Row count, date span, latest close and return, and the last `recent`
    /// collector batches.
    pub fn status(&self, recent: usize) -> Result<WarehouseStatus, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;

        let (observations, first_date, last_date): (i64, Option<String>, Option<String>) =
            connection.query_row(
                "SELECT COUNT(*), CAST(MIN(trade_date) AS VARCHAR), CAST(MAX(trade_date) AS VARCHAR) \
                 FROM observations",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let mut statement = connection.prepare(
            "SELECT h.close, r.return_pct \
             FROM vw_observations_history h \
             LEFT JOIN vw_daily_returns r ON r.trade_date = h.trade_date \
             ORDER BY h.trade_date DESC LIMIT 1",
        )?;
        let latest = statement
            .query_map([], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, Option<f64>>(1)?))
            })?
            .next()
            .transpose()?;

        let recent_ingests = recent_ingests(&connection, recent)?;

        Ok(WarehouseStatus {
            db_path: self.db_path().to_path_buf(),
            observations: observations.max(0) as u64,
            first_date,
            last_date,
            last_close: latest.map(|(close, _)| close),
            last_return: latest.and_then(|(_, ret)| ret),
            recent_ingests,
        })
    }
}

fn recent_ingests(connection: &Connection, limit: usize) -> Result<Vec<IngestEntry>, WarehouseError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut statement = connection.prepare(
        "SELECT request_id, source, row_count, latency_ms, CAST(timestamp AS VARCHAR) \
         FROM ingest_log ORDER BY timestamp DESC, rowid DESC LIMIT ?",
    )?;
    let rows = statement.query_map([limit], |row| {
        Ok(IngestEntry {
            request_id: row.get(0)?,
            source: row.get(1)?,
            row_count: row.get(2)?,
            latency_ms: row.get(3)?,
            timestamp: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the data root from `IBOV_HOME`, then `$HOME/.ibov`, then `.ibov`.
pub fn resolve_ibov_home() -> PathBuf {
    if let Some(path) = env::var_os("IBOV_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".ibov");
    }

    PathBuf::from(".ibov")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(temp: &tempfile::TempDir) -> WarehouseConfig {
        WarehouseConfig {
            db_path: temp.path().join("warehouse").join("test.duckdb"),
            max_pool_size: 2,
        }
    }

    fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(config(temp)).expect("warehouse open")
    }

    fn record(date: &str, close: f64) -> ObservationRecord {
        ObservationRecord {
            trade_date: date.to_string(),
            close,
            open: Some(close - 1.0),
            high: Some(close + 2.0),
            low: Some(close - 2.0),
            volume: Some(1_000.0),
        }
    }

    fn scalar_text(warehouse: &Warehouse, sql: &str) -> String {
        let connection = warehouse
            .manager
            .acquire(AccessMode::ReadOnly)
            .expect("connection");
        connection
            .query_row(sql, [], |row| row.get(0))
            .expect("query")
    }

    #[test]
    fn initializes_tables_and_views() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let count = scalar_text(
            &warehouse,
            "SELECT CAST(COUNT(*) AS VARCHAR) FROM information_schema.tables \
             WHERE table_name IN ('observations', 'ingest_log', 'vw_observations_history', 'vw_daily_returns')",
        );
        assert_eq!(count, "4");
    }

    #[test]
    fn upsert_is_keyed_by_trade_date() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let rows = vec![record("2024-01-02", 100.0), record("2024-01-03", 101.0)];
        warehouse
            .upsert_observations("csv", "req-001", &rows, 10)
            .expect("first upsert");
        let replaced = vec![record("2024-01-03", 111.0)];
        warehouse
            .upsert_observations("csv", "req-002", &replaced, 10)
            .expect("second upsert");

        assert_eq!(warehouse.count_observations(None).expect("count"), 2);
        let history = warehouse.load_history(None).expect("history");
        assert_eq!(history[1].trade_date, "2024-01-03");
        assert_eq!(history[1].close, 111.0);
    }

    #[test]
    fn user_supplied_text_is_passed_as_parameters() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let source = r#"csv'); DROP TABLE observations; --"#;
        warehouse
            .upsert_observations(source, "req-003", &[record("2024-01-02", 1.0)], 1)
            .expect("upsert");

        assert_eq!(scalar_text(&warehouse, "SELECT source FROM observations"), source);
    }

    #[test]
    fn history_is_ascending_and_range_filtered() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let rows = vec![
            record("2024-01-05", 103.0),
            record("2024-01-02", 100.0),
            record("2024-01-04", 102.0),
            record("2024-01-03", 101.0),
        ];
        warehouse
            .upsert_observations("csv", "req-004", &rows, 1)
            .expect("upsert");

        let all = warehouse.load_history(None).expect("history");
        let dates: Vec<_> = all.iter().map(|row| row.trade_date.as_str()).collect();
        assert_eq!(dates, ["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"]);

        let range = DateRange {
            from: "2024-01-03",
            to: "2024-01-04",
        };
        assert_eq!(warehouse.load_history(Some(range)).expect("range").len(), 2);
        assert_eq!(warehouse.count_observations(Some(range)).expect("count"), 2);
    }

    #[test]
    fn history_excludes_future_dates() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let rows = vec![record("2024-01-02", 100.0), record("2999-01-04", 1.0)];
        warehouse
            .upsert_observations("csv", "req-future", &rows, 1)
            .expect("upsert");

        assert_eq!(warehouse.count_observations(None).expect("count"), 2);
        let history = warehouse.load_history(None).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trade_date, "2024-01-02");
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        assert_eq!(
            warehouse
                .upsert_observations("csv", "req-005", &[], 1)
                .expect("noop"),
            0
        );
        let status = warehouse.status(10).expect("status");
        assert!(status.recent_ingests.is_empty());
        assert_eq!(status.observations, 0);
        assert_eq!(status.last_close, None);
    }

    #[test]
    fn status_reports_span_latest_return_and_batches() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse
            .upsert_observations(
                "csv",
                "req-006",
                &[record("2024-01-02", 100.0), record("2024-01-03", 110.0)],
                12,
            )
            .expect("first batch");
        warehouse
            .upsert_observations("csv", "req-007", &[record("2024-01-04", 99.0)], 8)
            .expect("second batch");

        let status = warehouse.status(1).expect("status");
        assert_eq!(status.observations, 3);
        assert_eq!(status.first_date.as_deref(), Some("2024-01-02"));
        assert_eq!(status.last_date.as_deref(), Some("2024-01-04"));
        assert_eq!(status.last_close, Some(99.0));
        let last_return = status.last_return.expect("return");
        assert!((last_return - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert_eq!(status.recent_ingests.len(), 1);
        assert_eq!(status.recent_ingests[0].request_id, "req-007");
        assert_eq!(status.recent_ingests[0].latency_ms, Some(8));
    }

    #[test]
    fn read_only_handle_reads_but_never_writes() {
        let temp = tempdir().expect("tempdir");
        {
            let writer = open_temp(&temp);
            writer
                .upsert_observations("csv", "req-008", &[record("2024-01-02", 100.0)], 1)
                .expect("seed");
        }

        let reader = Warehouse::open_read_only(config(&temp)).expect("open read-only");
        assert!(reader.is_read_only());
        assert_eq!(reader.load_history(None).expect("history").len(), 1);

        let error = reader
            .upsert_observations("csv", "req-009", &[record("2024-01-03", 101.0)], 1)
            .expect_err("read-only write");
        assert!(matches!(error, WarehouseError::ReadOnly { .. }));
    }

    #[test]
    fn read_only_open_requires_an_existing_file() {
        let temp = tempdir().expect("tempdir");

        let error = Warehouse::open_read_only(config(&temp)).expect_err("missing file");
        assert!(matches!(error, WarehouseError::NotFound { .. }));
        assert!(!config(&temp).db_path.exists());
    }
}
