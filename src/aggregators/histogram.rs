use crate::aggregators::range_test;
use crate::export::{Aggregator, Buckets, Count, Histogram, Sum};
use crate::metrics::{Descriptor, MetricsError, Number, NumberKind, Result};
use std::any::Any;
use std::mem;
use std::sync::{Arc, Mutex};

/// Create a new `HistogramAggregator` for the given descriptor and sorted
/// bucket boundaries.
pub fn histogram(descriptor: &Descriptor, boundaries: &[f64]) -> HistogramAggregator {
    let mut sorted_boundaries = boundaries.to_owned();
    sorted_boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let state = State::empty(descriptor.number_kind(), sorted_boundaries.len());

    HistogramAggregator {
        inner: Mutex::new(Inner {
            current: state.clone(),
            checkpoint: state,
        }),
        boundaries: Arc::new(sorted_boundaries),
        kind: descriptor.number_kind().clone(),
    }
}

/// This aggregator observes events and counts them in pre-determined buckets.
/// It also calculates the sum and count of all events.
#[derive(Debug)]
pub struct HistogramAggregator {
    inner: Mutex<Inner>,
    boundaries: Arc<Vec<f64>>,
    kind: NumberKind,
}

#[derive(Debug)]
struct Inner {
    current: State,
    checkpoint: State,
}

/// `bucket_counts` is one element longer than `boundaries`: index i counts
/// values in [boundaries[i-1], boundaries[i]), the last bucket is unbounded.
#[derive(Clone, Debug)]
struct State {
    bucket_counts: Vec<u64>,
    count: u64,
    sum: Number,
}

impl State {
    fn empty(kind: &NumberKind, num_boundaries: usize) -> Self {
        State {
            bucket_counts: vec![0; num_boundaries + 1],
            count: 0,
            sum: kind.zero(),
        }
    }
}

impl Sum for HistogramAggregator {
    fn sum(&self) -> Result<Number> {
        self.inner
            .lock()
            .map_err(From::from)
            .map(|inner| inner.checkpoint.sum.clone())
    }
}

impl Count for HistogramAggregator {
    fn count(&self) -> Result<u64> {
        self.inner
            .lock()
            .map_err(From::from)
            .map(|inner| inner.checkpoint.count)
    }
}

impl Histogram for HistogramAggregator {
    fn histogram(&self) -> Result<Buckets> {
        self.inner.lock().map_err(From::from).map(|inner| {
            Buckets::new(
                self.boundaries.as_ref().clone(),
                inner.checkpoint.bucket_counts.clone(),
            )
        })
    }
}

impl Aggregator for HistogramAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.inner.lock().map_err(From::from).map(|mut inner| {
            let kind = descriptor.number_kind();
            let value = number.to_f64(kind);

            // Buckets are half-open on the right, so the index is the first
            // boundary the value falls strictly below.
            let bucket_id = self
                .boundaries
                .iter()
                .position(|&boundary| value < boundary)
                .unwrap_or(self.boundaries.len());

            inner.current.bucket_counts[bucket_id] += 1;
            inner.current.count += 1;
            inner.current.sum.saturating_add(kind, number);
        })
    }

    fn checkpoint(&self, descriptor: &Descriptor) -> Result<()> {
        self.inner.lock().map_err(From::from).map(|mut inner| {
            let empty = State::empty(descriptor.number_kind(), self.boundaries.len());
            inner.checkpoint = mem::replace(&mut inner.current, empty);
        })
    }

    fn merge(
        &self,
        other: &(dyn Aggregator + Send + Sync),
        descriptor: &Descriptor,
    ) -> Result<()> {
        if let Some(other) = other.as_any().downcast_ref::<HistogramAggregator>() {
            if self.boundaries != other.boundaries {
                return Err(MetricsError::InconsistentAggregator(format!(
                    "Cannot merge histograms with different boundaries: {:?} and {:?}",
                    self.boundaries, other.boundaries
                )));
            }
            self.inner.lock().map_err(From::from).and_then(|mut inner| {
                other.inner.lock().map_err(From::from).map(|other| {
                    inner.checkpoint.count += other.checkpoint.count;
                    inner
                        .checkpoint
                        .sum
                        .saturating_add(descriptor.number_kind(), &other.checkpoint.sum);
                    for (idx, count) in other.checkpoint.bucket_counts.iter().enumerate() {
                        inner.checkpoint.bucket_counts[idx] += count;
                    }
                })
            })
        } else {
            Err(MetricsError::InconsistentAggregator(format!(
                "Expected {:?}, got: {:?}",
                self, other
            )))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
