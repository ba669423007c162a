//! Instrument identity and the error taxonomy of the aggregation pipeline.
use std::result;
use std::sync::PoisonError;
use thiserror::Error;

mod descriptor;
mod number;

pub use descriptor::Descriptor;
pub use number::{Number, NumberKind};

/// The kinds of instruments an application can report values through.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// An adding instrument: monotonic sums reported synchronously.
    Counter,
    /// A measuring instrument: per-event values that form a distribution.
    Measure,
    /// An observing instrument: values captured once per collection interval.
    Observer,
}

/// Errors returned by the metric aggregation pipeline.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Other errors not covered by specific cases.
    #[error("Metrics error: {0}")]
    Other(String),
    /// An operation on an aggregator of an incompatible concrete kind. The
    /// failed call leaves both operands unchanged.
    #[error("Inconsistent aggregator types: {0}")]
    InconsistentAggregator(String),
    /// The aggregator has no recorded updates in its checkpoint. This is a
    /// normal state for exporters to observe, not a defect.
    #[error("No data collected by this aggregator")]
    NoDataCollected,
    /// A quantile request or configuration outside the closed interval [0, 1].
    #[error("The requested quantile is out of range")]
    InvalidQuantile,
    /// Histogram boundary lists must be strictly increasing.
    #[error("Invalid histogram boundaries: {0}")]
    InvalidBoundaries(String),
    /// NaN cannot be folded into an aggregation.
    #[error("NaN value is an invalid input")]
    NaNInput,
}

impl<T> From<PoisonError<T>> for MetricsError {
    fn from(err: PoisonError<T>) -> Self {
        MetricsError::Other(err.to_string())
    }
}

/// A specialized `Result` type for metric operations.
pub type Result<T> = result::Result<T, MetricsError>;
