//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TradingDate`] | Calendar date of a trading session |
//! | [`Observation`] | Close plus optional open/high/low/volume |
//! | [`ObservationSeries`] | Date-sorted, date-unique observations |
//!
//! Construction validates invariants: closes are finite and non-negative, and
//! a series never holds two observations for the same date.

mod date;
mod observation;

pub use date::TradingDate;
pub use observation::{Observation, ObservationSeries};
