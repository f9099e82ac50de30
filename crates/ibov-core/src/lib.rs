//! # ibov core
//!
//! Domain types and the collector side of the IBOVESPA toolkit.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Trading dates, observations and observation series |
//! | [`error`] | Validation, source and core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`source`] | CSV market-data source and cleaning |
//! | [`collector`] | Fetch → clean → upsert pipeline |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ibov_core::{Collector, CsvMarketSource, ReqwestHttpClient, DEFAULT_SOURCE_URL};
//! use ibov_warehouse::WarehouseConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = CsvMarketSource::new(Arc::new(ReqwestHttpClient::new()), DEFAULT_SOURCE_URL);
//! let collector = Collector::new(source, WarehouseConfig::default());
//! let report = collector.run().await?;
//! println!("{} rows stored", report.table_rows);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod source;

pub use collector::{CollectReport, Collector, CollectorConfig, SOURCE_NAME};
pub use domain::{Observation, ObservationSeries, TradingDate};
pub use error::{CoreError, SourceError, ValidationError};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
#[cfg(any(test, feature = "test-util"))]
pub use http_client::ScriptedHttpClient;
pub use source::{
    check_connectivity, parse_observations, CsvMarketSource, DEFAULT_CONNECTIVITY_URL,
    DEFAULT_SOURCE_URL,
};
