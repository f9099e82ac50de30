//! Business-day (Monday–Friday) calendar helpers.

use ibov_core::{Observation, ObservationSeries, TradingDate};

/// The `n` business days strictly after `after`.
pub fn next_business_days(after: TradingDate, n: usize) -> Vec<TradingDate> {
    let mut dates = Vec::with_capacity(n);
    let mut current = after;
    while dates.len() < n {
        let next = current.next_day();
        if next == current {
            break;
        }
        current = next;
        if current.is_business_day() {
            dates.push(current);
        }
    }
    dates
}

/// Result of reindexing a series onto every business day in its span.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularizedSeries {
    pub series: ObservationSeries,
    /// Business days that had no observation and were filled.
    pub filled: usize,
}

/// Reindex onto every business day between the first and last observation.
///
/// Missing days copy the previous observation (forward fill). Leading gaps,
/// which only occur when the series starts on a weekend, copy the first
/// business-day observation (back fill). Weekend observations are dropped.
pub fn regularize_business_days(series: &ObservationSeries) -> RegularizedSeries {
    let observations = series.observations();
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return RegularizedSeries {
            series: ObservationSeries::default(),
            filled: 0,
        };
    };

    let mut output: Vec<Observation> = Vec::new();
    let mut filled = 0;
    let mut leading = 0;
    let mut cursor = 0;
    let mut current = first;
    loop {
        while cursor < observations.len() && observations[cursor].date < current {
            cursor += 1;
        }

        if current.is_business_day() {
            match observations.get(cursor).filter(|obs| obs.date == current) {
                Some(observation) => output.push(observation.clone()),
                None => {
                    filled += 1;
                    match output.last() {
                        Some(previous) => {
                            let mut copy = previous.clone();
                            copy.date = current;
                            output.push(copy);
                        }
                        None => leading += 1,
                    }
                }
            }
        }

        if current >= last {
            break;
        }
        let next = current.next_day();
        if next == current {
            break;
        }
        current = next;
    }

    if leading > 0 {
        if let Some(seed) = output.first().cloned() {
            let mut backfill = Vec::with_capacity(leading);
            let mut day = first;
            while backfill.len() < leading {
                if day.is_business_day() {
                    let mut copy = seed.clone();
                    copy.date = day;
                    backfill.push(copy);
                }
                let next = day.next_day();
                if next == day {
                    break;
                }
                day = next;
            }
            backfill.extend(output);
            output = backfill;
        }
    }

    RegularizedSeries {
        series: ObservationSeries::from_unsorted(output),
        filled,
    }
}
