//! Behaviour tests for the collector: what lands in the warehouse after a
//! fetch → clean → upsert cycle.

use std::sync::Arc;

use ibov_core::{CoreError, HttpResponse, SourceError};
use ibov_tests::*;
use ibov_warehouse::DateRange;
use tempfile::tempdir;

#[tokio::test]
async fn collected_observations_are_unique_and_ascending() {
    // Given: An export with rows out of order and a corrected duplicate date
    let temp = tempdir().expect("tempdir");
    let export = "\
Date,Close,High,Low,Open,Volume
2024-01-04,131226.0,132900.0,130800.0,132834.0,
2024-01-02,134346.0,134389.0,132697.0,132697.0,10100000
2024-01-03,132000.0,134389.0,132600.0,134346.0,11200000
2024-01-03,132834.0,134389.0,132600.0,134346.0,11200000
";
    let collector = scripted_collector(temp.path(), export, 1);

    // When: One collect cycle runs
    let report = collector.run().await.expect("collect");

    // Then: The warehouse holds one row per date, ascending, last occurrence kept
    assert_eq!(report.fetched_rows, 3);
    assert_eq!(report.table_rows, 3);
    let history = read_only_warehouse(temp.path()).load_history(None).expect("history");
    let dates: Vec<&str> = history.iter().map(|r| r.trade_date.as_str()).collect();
    assert_eq!(dates, ["2024-01-02", "2024-01-03", "2024-01-04"]);
    assert_eq!(history[1].close, 132_834.0);
    assert_eq!(history[2].volume, None);
    assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn rerunning_the_collector_is_idempotent() {
    // Given: A 40-day export collected once
    let temp = tempdir().expect("tempdir");
    let records = synthetic_records("2024-03-01", 40, 7);
    let export = csv_export(&records);
    let collector = scripted_collector(temp.path(), &export, 2);
    let first = collector.run().await.expect("first collect");

    // When: The same export is collected again
    let second = collector.run().await.expect("second collect");

    // Then: Row counts for the range and the table are unchanged
    assert_eq!(first.range_rows, 40);
    assert_eq!(second.range_rows, first.range_rows);
    assert_eq!(second.table_rows, first.table_rows);

    let range = DateRange {
        from: &records[0].trade_date,
        to: &records[39].trade_date,
    };
    assert_eq!(
        read_only_warehouse(temp.path())
            .count_observations(Some(range))
            .expect("count"),
        40
    );
}

#[tokio::test]
async fn overlapping_exports_only_add_new_dates() {
    // Given: A warehouse holding the first 30 days of a 45-day history
    let temp = tempdir().expect("tempdir");
    let records = synthetic_records("2024-05-01", 45, 11);
    seed_warehouse(temp.path(), &records[..30]);

    // When: An export covering days 20..45 is collected
    let collector = scripted_collector(temp.path(), &csv_export(&records[20..]), 1);
    let report = collector.run().await.expect("collect");

    // Then: Only the 15 unseen dates are added
    assert_eq!(report.fetched_rows, 25);
    assert_eq!(report.table_rows, 45);
}

#[tokio::test]
async fn unavailable_source_writes_nothing() {
    // Given: A source answering HTTP 503
    let temp = tempdir().expect("tempdir");
    let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse {
        status: 503,
        body: String::from("maintenance"),
    })]));
    seed_warehouse(temp.path(), &[]);
    let collector = Collector::new(
        CsvMarketSource::new(client, "https://example.test/ibov.csv"),
        warehouse_config(temp.path()),
    );

    // When: A collect cycle runs
    let error = collector.run().await.expect_err("source is down");

    // Then: The failure surfaces and the table stays empty
    assert!(matches!(
        error,
        CoreError::Source(SourceError::Unavailable { status: 503, .. })
    ));
    assert_eq!(
        read_only_warehouse(temp.path())
            .count_observations(None)
            .expect("count"),
        0
    );
}
