use std::collections::BTreeMap;

use ibov_warehouse::ObservationRecord;
use serde::{Deserialize, Serialize};

use crate::{TradingDate, ValidationError};

/// One daily price record, keyed by its trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: TradingDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl Observation {
    pub fn new(
        date: TradingDate,
        close: f64,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        volume: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("close", close)?;
        validate_optional_finite("open", open)?;
        validate_optional_finite("high", high)?;
        validate_optional_finite("low", low)?;
        validate_optional_finite("volume", volume)?;

        Ok(Self {
            date,
            close,
            open,
            high,
            low,
            volume,
        })
    }

    pub fn close_only(date: TradingDate, close: f64) -> Result<Self, ValidationError> {
        Self::new(date, close, None, None, None, None)
    }

    pub fn to_record(&self) -> ObservationRecord {
        ObservationRecord {
            trade_date: self.date.format_iso(),
            close: self.close,
            open: self.open,
            high: self.high,
            low: self.low,
            volume: self.volume,
        }
    }

    pub fn from_record(record: &ObservationRecord) -> Result<Self, ValidationError> {
        Self::new(
            TradingDate::parse(&record.trade_date)?,
            record.close,
            record.open,
            record.high,
            record.low,
            record.volume,
        )
    }
}

/// Observations with strictly increasing, unique trading dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSeries {
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// Sort ascending by date and drop duplicate dates, keeping the last
    /// occurrence of each date in input order.
    pub fn from_unsorted(observations: Vec<Observation>) -> Self {
        let mut by_date = BTreeMap::new();
        for observation in observations {
            by_date.insert(observation.date, observation);
        }
        Self {
            observations: by_date.into_values().collect(),
        }
    }

    pub fn from_records(records: &[ObservationRecord]) -> Result<Self, ValidationError> {
        let observations = records
            .iter()
            .map(Observation::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_unsorted(observations))
    }

    pub fn to_records(&self) -> Vec<ObservationRecord> {
        self.observations.iter().map(Observation::to_record).collect()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    pub fn closes(&self) -> Vec<f64> {
        self.observations.iter().map(|obs| obs.close).collect()
    }

    pub fn dates(&self) -> Vec<TradingDate> {
        self.observations.iter().map(|obs| obs.date).collect()
    }

    pub fn first_date(&self) -> Option<TradingDate> {
        self.observations.first().map(|obs| obs.date)
    }

    pub fn last_date(&self) -> Option<TradingDate> {
        self.observations.last().map(|obs| obs.date)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations within the inclusive range `[from, to]`.
    pub fn range(&self, from: TradingDate, to: TradingDate) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let start = self.observations.partition_point(|obs| obs.date < from);
        let end = self.observations.partition_point(|obs| obs.date <= to);
        Ok(Self {
            observations: self.observations[start..end].to_vec(),
        })
    }

    /// The last `n` observations (all of them when `n >= len`).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.observations.len().saturating_sub(n);
        Self {
            observations: self.observations[start..].to_vec(),
        }
    }

    /// Split into `(head, last n)`. `n` is capped at the series length.
    pub fn split_last(&self, n: usize) -> (Self, Self) {
        let split = self.observations.len().saturating_sub(n);
        let (head, tail) = self.observations.split_at(split);
        (
            Self {
                observations: head.to_vec(),
            },
            Self {
                observations: tail.to_vec(),
            },
        )
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_finite(field: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_finite() => Err(ValidationError::NonFiniteValue { field }),
        _ => Ok(()),
    }
}
