//! Capability traits exposed by checkpointed aggregators.
//!
//! Exporters read checkpointed state exclusively through these traits; which
//! of them a record supports is determined by the concrete aggregator kind the
//! selector chose for its instrument.
use crate::metrics::{Number, Result};
use std::time::SystemTime;

/// An aggregator exposing a running sum.
pub trait Sum {
    /// The sum of the checkpointed values.
    fn sum(&self) -> Result<Number>;
}

/// An aggregator exposing a count of checkpointed updates.
pub trait Count {
    /// The number of values folded into the checkpoint.
    fn count(&self) -> Result<u64>;
}

/// An aggregator exposing the minimum checkpointed value.
pub trait Min {
    /// The minimum checkpointed value, or `NoDataCollected` when empty.
    fn min(&self) -> Result<Number>;
}

/// An aggregator exposing the maximum checkpointed value.
pub trait Max {
    /// The maximum checkpointed value, or `NoDataCollected` when empty.
    fn max(&self) -> Result<Number>;
}

/// An aggregator exposing the most recently recorded value and the wall-clock
/// time it was recorded at.
pub trait LastValue {
    /// The last checkpointed value and its update timestamp, or
    /// `NoDataCollected` when no update was ever recorded.
    fn last_value(&self) -> Result<(Number, SystemTime)>;
}

/// An aggregator answering quantile queries over its checkpoint.
pub trait Quantile {
    /// The value at quantile `q` of the checkpointed distribution.
    ///
    /// `q` must lie in the closed interval [0, 1], else `InvalidQuantile`.
    fn quantile(&self, q: f64) -> Result<Number>;
}

/// An aggregator retaining every checkpointed value.
pub trait Points {
    /// The checkpointed values in sorted order.
    fn points(&self) -> Result<Vec<Number>>;
}

/// The combined min/max/sum/count capability.
pub trait MinMaxSumCount: Min + Max + Sum + Count {}

/// A distribution supports min/max/sum/count plus quantile queries.
pub trait Distribution: MinMaxSumCount + Quantile {}

/// An aggregator exposing fixed-boundary bucket counts.
pub trait Histogram: Sum + Count {
    /// The checkpointed per-bucket counts and their boundaries.
    fn histogram(&self) -> Result<Buckets>;
}

/// The bucket counts of a checkpointed histogram.
///
/// `boundaries` partitions the value axis: bucket `i` counts values in
/// `[boundaries[i-1], boundaries[i])`, with underflow in bucket 0 and overflow
/// in the last bucket, so `counts.len() == boundaries.len() + 1`.
#[derive(Clone, Debug)]
pub struct Buckets {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
}

impl Buckets {
    /// Create new `Buckets` from the given boundaries and counts.
    pub fn new(boundaries: Vec<f64>, counts: Vec<u64>) -> Self {
        Buckets { boundaries, counts }
    }

    /// The sorted bucket boundaries.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// The per-bucket counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }
}
