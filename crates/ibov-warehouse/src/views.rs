//! Database views read by the trainer and the dashboard.

use ::duckdb::Connection;

/// Create database views over the `observations` table.
///
/// - `vw_observations_history`: non-null closes up to today, oldest first
/// - `vw_daily_returns`: close-to-close return per trading date
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_observations_history AS
SELECT
    trade_date,
    close,
    open,
    high,
    low,
    volume
FROM observations
WHERE close IS NOT NULL
  AND trade_date <= CAST(CURRENT_TIMESTAMP AS DATE)
ORDER BY trade_date ASC;

CREATE OR REPLACE VIEW vw_daily_returns AS
SELECT
    trade_date,
    CASE
        WHEN LAG(close) OVER (ORDER BY trade_date) IS NULL THEN NULL
        WHEN LAG(close) OVER (ORDER BY trade_date) = 0 THEN NULL
        ELSE (close / LAG(close) OVER (ORDER BY trade_date)) - 1.0
    END AS return_pct
FROM observations;
",
    )?;

    Ok(())
}
