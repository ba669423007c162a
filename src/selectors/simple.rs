//! Simple aggregator selectors, one per aggregation strategy.
//!
//! Besides the named strategies, users can provide their own
//! [`AggregatorSelector`] implementation to mix aggregators per instrument.
use crate::aggregators::{self, DdSketchConfig};
use crate::export::{Aggregator, AggregatorSelector};
use crate::metrics::{Descriptor, InstrumentKind, MetricsError, Result};
use std::sync::Arc;

/// Aggregation selection strategies.
#[derive(Debug, Clone)]
pub enum Selector {
    /// A simple aggregation selector that uses last-value and sum
    /// aggregators. Apply a standard cost of collection, without
    /// per-instrument sums.
    Inexpensive,
    /// A simple aggregation selector that uses sum and array aggregators.
    /// Uses more memory than the `Sketch` strategy because it retains every
    /// recorded value, therefore is able to compute exact quantiles.
    Exact,
    /// A simple aggregation selector that uses sum and ddsketch aggregators.
    Sketch(DdSketchConfig),
    /// A simple aggregation selector that uses sum and histogram aggregators
    /// with the given bucket boundaries.
    Histogram(Vec<f64>),
}

impl Selector {
    /// Build a histogram selector, validating that the given boundaries are
    /// strictly increasing.
    pub fn histogram(boundaries: Vec<f64>) -> Result<Selector> {
        if boundaries.is_empty() {
            return Err(MetricsError::InvalidBoundaries(
                "at least one boundary is required".into(),
            ));
        }
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(MetricsError::InvalidBoundaries(format!(
                "boundaries must be strictly increasing, got {:?}",
                boundaries
            )));
        }
        Ok(Selector::Histogram(boundaries))
    }
}

impl AggregatorSelector for Selector {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Option<Arc<dyn Aggregator + Send + Sync>> {
        match self {
            Selector::Inexpensive => match descriptor.instrument_kind() {
                InstrumentKind::Observer | InstrumentKind::Measure => {
                    Some(Arc::new(aggregators::min_max_sum_count(descriptor)))
                }
                _ => Some(Arc::new(aggregators::sum())),
            },
            Selector::Exact => match descriptor.instrument_kind() {
                InstrumentKind::Observer | InstrumentKind::Measure => {
                    Some(Arc::new(aggregators::array()))
                }
                _ => Some(Arc::new(aggregators::sum())),
            },
            Selector::Sketch(config) => match descriptor.instrument_kind() {
                InstrumentKind::Observer | InstrumentKind::Measure => Some(Arc::new(
                    aggregators::ddsketch(config, descriptor.number_kind().clone()),
                )),
                _ => Some(Arc::new(aggregators::sum())),
            },
            Selector::Histogram(boundaries) => match descriptor.instrument_kind() {
                InstrumentKind::Observer | InstrumentKind::Measure => {
                    Some(Arc::new(aggregators::histogram(descriptor, boundaries)))
                }
                _ => Some(Arc::new(aggregators::sum())),
            },
        }
    }
}
