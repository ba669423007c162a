use crate::aggregators::range_test;
use crate::export::{Aggregator, LastValue};
use crate::metrics::{Descriptor, MetricsError, Number, Result};
use std::any::Any;
use std::sync::Mutex;
use std::time::SystemTime;

/// Create a new last-value aggregator.
pub fn last_value() -> LastValueAggregator {
    LastValueAggregator::default()
}

/// An aggregator for observer events: keeps the most recently recorded value
/// and the wall-clock time it was recorded at.
#[derive(Debug, Default)]
pub struct LastValueAggregator {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<LastValueData>,
    checkpoint: Option<LastValueData>,
}

#[derive(Clone, Debug)]
struct LastValueData {
    value: Number,
    timestamp: SystemTime,
}

impl LastValue for LastValueAggregator {
    fn last_value(&self) -> Result<(Number, SystemTime)> {
        self.inner.lock().map_err(From::from).and_then(|inner| {
            inner
                .checkpoint
                .as_ref()
                .map(|data| (data.value.clone(), data.timestamp))
                .ok_or(MetricsError::NoDataCollected)
        })
    }
}

impl Aggregator for LastValueAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.inner.lock().map_err(From::from).map(|mut inner| {
            inner.current = Some(LastValueData {
                value: number.clone(),
                timestamp: SystemTime::now(),
            });
        })
    }

    fn checkpoint(&self, _descriptor: &Descriptor) -> Result<()> {
        self.inner.lock().map_err(From::from).map(|mut inner| {
            inner.checkpoint = inner.current.take();
        })
    }

    fn merge(
        &self,
        other: &(dyn Aggregator + Send + Sync),
        _descriptor: &Descriptor,
    ) -> Result<()> {
        if let Some(other) = other.as_any().downcast_ref::<Self>() {
            self.inner.lock().map_err(From::from).and_then(|mut inner| {
                other.inner.lock().map_err(From::from).map(|other_inner| {
                    let later = match (inner.checkpoint.as_ref(), other_inner.checkpoint.as_ref())
                    {
                        (Some(own), Some(theirs)) => theirs.timestamp > own.timestamp,
                        (None, Some(_)) => true,
                        _ => false,
                    };
                    if later {
                        inner.checkpoint = other_inner.checkpoint.clone();
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
    use crate::metrics::{InstrumentKind, NumberKind};
    use std::time::Duration;

    fn observer_descriptor() -> Descriptor {
        Descriptor::new(
            "test.last".into(),
            InstrumentKind::Observer,
            NumberKind::I64,
        )
    }

    #[test]
    fn update_timestamp_within_bounds() {
        let desc = observer_descriptor();
        let agg = last_value();

        let before = SystemTime::now();
        agg.update(&321i64.into(), &desc).unwrap();
        let after = SystemTime::now();
        agg.checkpoint(&desc).unwrap();

        let (value, timestamp) = agg.last_value().unwrap();
        assert_eq!(value.to_i64(desc.number_kind()), 321);
        assert!(timestamp >= before);
        assert!(timestamp <= after);
    }

    #[test]
    fn checkpoint_without_update_is_empty() {
        let desc = observer_descriptor();
        let agg = last_value();
        agg.checkpoint(&desc).unwrap();
        assert!(matches!(
            agg.last_value(),
            Err(MetricsError::NoDataCollected)
        ));
    }

    #[test]
    fn merge_keeps_later_timestamp() {
        let desc = observer_descriptor();
        let earlier = last_value();
        let later = last_value();

        earlier.update(&1i64.into(), &desc).unwrap();
        // SystemTime granularity can be coarse; force distinct timestamps.
        std::thread::sleep(Duration::from_millis(5));
        later.update(&2i64.into(), &desc).unwrap();
        earlier.checkpoint(&desc).unwrap();
        later.checkpoint(&desc).unwrap();

        earlier.merge(&later, &desc).unwrap();
        let (value, _) = earlier.last_value().unwrap();
        assert_eq!(value.to_i64(desc.number_kind()), 2);

        // Merging the other direction keeps the same winner.
        later.merge(&earlier, &desc).unwrap();
        let (value, _) = later.last_value().unwrap();
        assert_eq!(value.to_i64(desc.number_kind()), 2);
    }
}
