use crate::aggregators::range_test;
use crate::export::{Aggregator, Sum};
use crate::metrics::{Descriptor, MetricsError, Number, Result};
use std::any::Any;

/// Create a new sum aggregator.
pub fn sum() -> SumAggregator {
    SumAggregator::default()
}

/// An aggregator for counter events: a running sum, saturating per numeric
/// kind.
///
/// Both states are lock-free: updates CAS into `current`, and `checkpoint`
/// rotates it with an atomic swap-to-zero, so a checkpoint observes a
/// consistent prefix of concurrent updates.
#[derive(Debug, Default)]
pub struct SumAggregator {
    current: Number,
    checkpoint: Number,
}

impl Sum for SumAggregator {
    fn sum(&self) -> Result<Number> {
        Ok(self.checkpoint.clone())
    }
}

impl Aggregator for SumAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.current.saturating_add(descriptor.number_kind(), number);
        Ok(())
    }

    fn checkpoint(&self, _descriptor: &Descriptor) -> Result<()> {
        self.checkpoint.assign(&self.current.take());
        Ok(())
    }

    fn merge(&self, other: &(dyn Aggregator + Send + Sync), descriptor: &Descriptor) -> Result<()> {
        if let Some(other_sum) = other.as_any().downcast_ref::<SumAggregator>() {
            self.checkpoint
                .saturating_add(descriptor.number_kind(), &other_sum.checkpoint);
            Ok(())
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
    use std::sync::Arc;
    use std::thread;

    fn counter_descriptor(kind: NumberKind) -> Descriptor {
        Descriptor::new("test.sum".into(), InstrumentKind::Counter, kind)
    }

    #[test]
    fn accumulates_and_rotates() {
        let desc = counter_descriptor(NumberKind::I64);
        let agg = sum();

        agg.update(&10i64.into(), &desc).unwrap();
        agg.update(&5i64.into(), &desc).unwrap();
        agg.checkpoint(&desc).unwrap();
        assert_eq!(agg.sum().unwrap().to_i64(desc.number_kind()), 15);

        // The live state was reset by the rotation.
        agg.checkpoint(&desc).unwrap();
        assert_eq!(agg.sum().unwrap().to_i64(desc.number_kind()), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let desc = Arc::new(counter_descriptor(NumberKind::U64));
        let agg = Arc::new(sum());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let desc = Arc::clone(&desc);
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        agg.update(&1u64.into(), &desc).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        agg.checkpoint(&desc).unwrap();
        assert_eq!(agg.sum().unwrap().to_u64(desc.number_kind()), 4_000);
    }

    #[test]
    fn merge_adds_checkpoints() {
        let desc = counter_descriptor(NumberKind::I64);
        let a = sum();
        let b = sum();

        a.update(&7i64.into(), &desc).unwrap();
        b.update(&3i64.into(), &desc).unwrap();
        a.checkpoint(&desc).unwrap();
        b.checkpoint(&desc).unwrap();

        a.merge(&b, &desc).unwrap();
        assert_eq!(a.sum().unwrap().to_i64(desc.number_kind()), 10);
    }

    #[test]
    fn merge_rejects_other_kinds() {
        let desc = counter_descriptor(NumberKind::I64);
        let a = sum();
        let other = crate::aggregators::last_value();
        assert!(matches!(
            a.merge(&other, &desc),
            Err(MetricsError::InconsistentAggregator(_))
        ));
        // The failed merge left the checkpoint untouched.
        assert_eq!(a.sum().unwrap().to_i64(desc.number_kind()), 0);
    }
}
