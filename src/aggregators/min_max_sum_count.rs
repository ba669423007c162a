use crate::aggregators::range_test;
use crate::export::{Aggregator, Count, Max, Min, MinMaxSumCount, Sum};
use crate::metrics::{Descriptor, MetricsError, Number, NumberKind, Result};
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Mutex;

/// Create a new `MinMaxSumCountAggregator`
pub fn min_max_sum_count(descriptor: &Descriptor) -> MinMaxSumCountAggregator {
    MinMaxSumCountAggregator {
        inner: Mutex::new(Inner::default()),
        kind: descriptor.number_kind().clone(),
    }
}

/// An `Aggregator` that aggregates events that form a distribution, keeping
/// only the min, max, sum, and count.
#[derive(Debug)]
pub struct MinMaxSumCountAggregator {
    inner: Mutex<Inner>,
    kind: NumberKind,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<State>,
    checkpoint: Option<State>,
}

#[derive(Clone, Debug)]
struct State {
    count: u64,
    sum: Number,
    min: Number,
    max: Number,
}

impl Min for MinMaxSumCountAggregator {
    fn min(&self) -> Result<Number> {
        self.inner.lock().map_err(From::from).and_then(|inner| {
            inner
                .checkpoint
                .as_ref()
                .map(|state| state.min.clone())
                .ok_or(MetricsError::NoDataCollected)
        })
    }
}

impl Max for MinMaxSumCountAggregator {
    fn max(&self) -> Result<Number> {
        self.inner.lock().map_err(From::from).and_then(|inner| {
            inner
                .checkpoint
                .as_ref()
                .map(|state| state.max.clone())
                .ok_or(MetricsError::NoDataCollected)
        })
    }
}

impl Sum for MinMaxSumCountAggregator {
    fn sum(&self) -> Result<Number> {
        self.inner.lock().map_err(From::from).map(|inner| {
            inner
                .checkpoint
                .as_ref()
                .map_or(self.kind.zero(), |state| state.sum.clone())
        })
    }
}

impl Count for MinMaxSumCountAggregator {
    fn count(&self) -> Result<u64> {
        self.inner
            .lock()
            .map_err(From::from)
            .map(|inner| inner.checkpoint.as_ref().map_or(0, |state| state.count))
    }
}

impl MinMaxSumCount for MinMaxSumCountAggregator {}

impl Aggregator for MinMaxSumCountAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.inner.lock().map_err(From::from).map(|mut inner| {
            let kind = descriptor.number_kind();
            if let Some(state) = &mut inner.current {
                state.count = state.count.saturating_add(1);
                state.sum.saturating_add(kind, number);
                if number.partial_cmp(kind, &state.min) == Some(Ordering::Less) {
                    state.min = number.clone();
                }
                if number.partial_cmp(kind, &state.max) == Some(Ordering::Greater) {
                    state.max = number.clone();
                }
            } else {
                inner.current = Some(State {
                    count: 1,
                    sum: number.clone(),
                    min: number.clone(),
                    max: number.clone(),
                })
            }
        })
    }

    fn checkpoint(&self, _descriptor: &Descriptor) -> Result<()> {
        self.inner.lock().map_err(From::from).map(|mut inner| {
            inner.checkpoint = inner.current.take();
        })
    }

    fn merge(&self, other: &(dyn Aggregator + Send + Sync), desc: &Descriptor) -> Result<()> {
        if let Some(other) = other.as_any().downcast_ref::<Self>() {
            self.inner.lock().map_err(From::from).and_then(|mut inner| {
                other.inner.lock().map_err(From::from).map(|other_inner| {
                    match (inner.checkpoint.as_mut(), other_inner.checkpoint.as_ref()) {
                        (None, Some(other_state)) => {
                            inner.checkpoint = Some(other_state.clone());
                        }
                        (Some(_), None) | (None, None) => (),
                        (Some(state), Some(other_state)) => {
                            let kind = desc.number_kind();
                            state.count = state.count.saturating_add(other_state.count);
                            state.sum.saturating_add(kind, &other_state.sum);

                            if state.min.partial_cmp(kind, &other_state.min)
                                == Some(Ordering::Greater)
                            {
                                state.min.assign(&other_state.min);
                            }
                            if state.max.partial_cmp(kind, &other_state.max)
                                == Some(Ordering::Less)
                            {
                                state.max.assign(&other_state.max);
                            }
                        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InstrumentKind;

    fn measure_descriptor() -> Descriptor {
        Descriptor::new(
            "test.mmsc".into(),
            InstrumentKind::Measure,
            NumberKind::F64,
        )
    }

    #[test]
    fn tracks_min_max_sum_count() {
        let desc = measure_descriptor();
        let agg = min_max_sum_count(&desc);

        agg.update(&123.456.into(), &desc).unwrap();
        agg.update(&876.543.into(), &desc).unwrap();
        agg.checkpoint(&desc).unwrap();

        let kind = desc.number_kind();
        assert_eq!(agg.min().unwrap().to_f64(kind), 123.456);
        assert_eq!(agg.max().unwrap().to_f64(kind), 876.543);
        assert_eq!(agg.sum().unwrap().to_f64(kind), 123.456 + 876.543);
        assert_eq!(agg.count().unwrap(), 2);
    }

    #[test]
    fn empty_checkpoint_reports_no_data() {
        let desc = measure_descriptor();
        let agg = min_max_sum_count(&desc);
        agg.checkpoint(&desc).unwrap();

        assert!(matches!(agg.min(), Err(MetricsError::NoDataCollected)));
        assert!(matches!(agg.max(), Err(MetricsError::NoDataCollected)));
        assert_eq!(agg.count().unwrap(), 0);
    }

    #[test]
    fn merge_into_empty_adopts_operand() {
        let desc = measure_descriptor();
        let empty = min_max_sum_count(&desc);
        let full = min_max_sum_count(&desc);

        full.update(&2.0.into(), &desc).unwrap();
        empty.checkpoint(&desc).unwrap();
        full.checkpoint(&desc).unwrap();

        empty.merge(&full, &desc).unwrap();
        assert_eq!(empty.count().unwrap(), 1);
        assert_eq!(empty.min().unwrap().to_f64(desc.number_kind()), 2.0);
    }

    #[test]
    fn merge_combines_extrema() {
        let desc = measure_descriptor();
        let a = min_max_sum_count(&desc);
        let b = min_max_sum_count(&desc);

        a.update(&5.0.into(), &desc).unwrap();
        a.update(&10.0.into(), &desc).unwrap();
        b.update(&1.0.into(), &desc).unwrap();
        b.update(&7.0.into(), &desc).unwrap();
        a.checkpoint(&desc).unwrap();
        b.checkpoint(&desc).unwrap();

        a.merge(&b, &desc).unwrap();
        let kind = desc.number_kind();
        assert_eq!(a.min().unwrap().to_f64(kind), 1.0);
        assert_eq!(a.max().unwrap().to_f64(kind), 10.0);
        assert_eq!(a.sum().unwrap().to_f64(kind), 23.0);
        assert_eq!(a.count().unwrap(), 4);
    }
}
