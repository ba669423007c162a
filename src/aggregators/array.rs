use crate::aggregators::range_test;
use crate::export::{
    Aggregator, Count, Distribution, Max, Min, MinMaxSumCount, Points, Quantile, Sum,
};
use crate::metrics::{Descriptor, MetricsError, Number, NumberKind, Result};
use std::any::Any;
use std::cmp;
use std::mem;
use std::sync::Mutex;

/// Create a new default `ArrayAggregator`
pub fn array() -> ArrayAggregator {
    ArrayAggregator::default()
}

/// An aggregator which stores every recorded value, supporting exact
/// nearest-rank quantiles at unbounded memory cost.
#[derive(Debug, Default)]
pub struct ArrayAggregator {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    current: State,
    checkpoint: State,
}

#[derive(Debug, Default)]
struct State {
    sum: Number,
    points: Option<PointBuffer>,
}

impl Min for ArrayAggregator {
    fn min(&self) -> Result<Number> {
        self.inner.lock().map_err(Into::into).and_then(|inner| {
            inner
                .checkpoint
                .points
                .as_ref()
                .map_or(Err(MetricsError::NoDataCollected), |p| p.quantile(0.0))
        })
    }
}

impl Max for ArrayAggregator {
    fn max(&self) -> Result<Number> {
        self.inner.lock().map_err(Into::into).and_then(|inner| {
            inner
                .checkpoint
                .points
                .as_ref()
                .map_or(Err(MetricsError::NoDataCollected), |p| p.quantile(1.0))
        })
    }
}

impl Sum for ArrayAggregator {
    fn sum(&self) -> Result<Number> {
        self.inner
            .lock()
            .map_err(Into::into)
            .map(|inner| inner.checkpoint.sum.clone())
    }
}

impl Count for ArrayAggregator {
    fn count(&self) -> Result<u64> {
        self.inner
            .lock()
            .map_err(Into::into)
            .map(|inner| inner.checkpoint.points.as_ref().map_or(0, |p| p.len() as u64))
    }
}

impl MinMaxSumCount for ArrayAggregator {}

impl Quantile for ArrayAggregator {
    fn quantile(&self, q: f64) -> Result<Number> {
        self.inner.lock().map_err(Into::into).and_then(|inner| {
            inner
                .checkpoint
                .points
                .as_ref()
                .map_or(Err(MetricsError::NoDataCollected), |p| p.quantile(q))
        })
    }
}

impl Distribution for ArrayAggregator {}

impl Points for ArrayAggregator {
    fn points(&self) -> Result<Vec<Number>> {
        self.inner.lock().map_err(Into::into).map(|inner| {
            inner
                .checkpoint
                .points
                .as_ref()
                .map_or_else(Vec::new, |p| p.0.clone())
        })
    }
}

impl Aggregator for ArrayAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.inner.lock().map_err(Into::into).map(|mut inner| {
            if let Some(points) = inner.current.points.as_mut() {
                points.push(number.clone());
            } else {
                inner.current.points = Some(PointBuffer::with_number(number.clone()));
            }
            inner
                .current
                .sum
                .saturating_add(descriptor.number_kind(), number)
        })
    }

    fn checkpoint(&self, descriptor: &Descriptor) -> Result<()> {
        self.inner.lock().map_err(Into::into).map(|mut inner| {
            inner.checkpoint = mem::take(&mut inner.current);
            if let Some(points) = inner.checkpoint.points.as_mut() {
                points.sort(descriptor.number_kind());
            }
        })
    }

    fn merge(&self, other: &(dyn Aggregator + Send + Sync), desc: &Descriptor) -> Result<()> {
        if let Some(other) = other.as_any().downcast_ref::<Self>() {
            self.inner.lock().map_err(Into::into).and_then(|mut inner| {
                other
                    .inner
                    .lock()
                    .map_err(From::from)
                    .map(|other_inner| {
                        inner
                            .checkpoint
                            .sum
                            .saturating_add(desc.number_kind(), &other_inner.checkpoint.sum);
                        match (
                            inner.checkpoint.points.as_mut(),
                            other_inner.checkpoint.points.as_ref(),
                        ) {
                            (Some(points), Some(other_points)) => {
                                points.combine(desc.number_kind(), other_points)
                            }
                            (None, Some(other_points)) => {
                                inner.checkpoint.points = Some(other_points.clone())
                            }
                            _ => (),
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

#[derive(Clone, Debug, Default)]
struct PointBuffer(Vec<Number>);

impl PointBuffer {
    fn with_number(number: Number) -> Self {
        PointBuffer(vec![number])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn push(&mut self, number: Number) {
        self.0.push(number)
    }

    fn sort(&mut self, kind: &NumberKind) {
        match kind {
            NumberKind::I64 => self.0.sort_by(|a, b| a.to_i64(kind).cmp(&b.to_i64(kind))),
            NumberKind::U64 => self.0.sort_by(|a, b| a.to_u64(kind).cmp(&b.to_u64(kind))),
            NumberKind::F64 => self.0.sort_by(|a, b| {
                // NaN never enters the buffer, range_test rejects it upstream.
                a.to_f64(kind)
                    .partial_cmp(&b.to_f64(kind))
                    .unwrap_or(cmp::Ordering::Less)
            }),
        }
    }

    fn combine(&mut self, kind: &NumberKind, other: &PointBuffer) {
        self.0.append(&mut other.0.clone());
        self.sort(kind)
    }
}

impl Quantile for PointBuffer {
    fn quantile(&self, q: f64) -> Result<Number> {
        if self.0.is_empty() {
            return Err(MetricsError::NoDataCollected);
        }

        if !(0.0..=1.0).contains(&q) {
            return Err(MetricsError::InvalidQuantile);
        }

        if q == 0.0 || self.0.len() == 1 {
            return Ok(self.0[0].clone());
        } else if (q - 1.0).abs() < f64::EPSILON {
            return Ok(self.0[self.0.len() - 1].clone());
        }

        let position = (self.0.len() as f64 - 1.0) * q;
        Ok(self.0[position.ceil() as usize].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InstrumentKind;

    fn measure_descriptor() -> Descriptor {
        Descriptor::new(
            "test.array".into(),
            InstrumentKind::Measure,
            NumberKind::F64,
        )
    }

    #[test]
    fn exact_quantiles() {
        let desc = measure_descriptor();
        let agg = array();
        for i in 0..1000 {
            agg.update(&(i as f64 + 0.5).into(), &desc).unwrap();
        }
        agg.checkpoint(&desc).unwrap();

        let kind = desc.number_kind();
        assert_eq!(agg.min().unwrap().to_f64(kind), 0.5);
        assert_eq!(agg.max().unwrap().to_f64(kind), 999.5);
        assert_eq!(agg.sum().unwrap().to_f64(kind), 500_000.0);
        assert_eq!(agg.count().unwrap(), 1000);
        assert_eq!(agg.quantile(0.5).unwrap().to_f64(kind), 500.5);
        assert_eq!(agg.quantile(0.9).unwrap().to_f64(kind), 900.5);
        assert_eq!(agg.quantile(0.99).unwrap().to_f64(kind), 990.5);
    }

    #[test]
    fn quantile_out_of_range() {
        let desc = measure_descriptor();
        let agg = array();
        agg.update(&1.0.into(), &desc).unwrap();
        agg.checkpoint(&desc).unwrap();

        assert!(matches!(
            agg.quantile(1.1),
            Err(MetricsError::InvalidQuantile)
        ));
        assert!(matches!(
            agg.quantile(-0.1),
            Err(MetricsError::InvalidQuantile)
        ));
        assert!(agg.quantile(0.9).is_ok());
    }

    #[test]
    fn merge_concatenates_and_resorts() {
        let desc = measure_descriptor();
        let a = array();
        let b = array();

        for value in [5.0, 1.0] {
            a.update(&value.into(), &desc).unwrap();
        }
        for value in [4.0, 2.0] {
            b.update(&value.into(), &desc).unwrap();
        }
        a.checkpoint(&desc).unwrap();
        b.checkpoint(&desc).unwrap();
        a.merge(&b, &desc).unwrap();

        let kind = desc.number_kind();
        let points: Vec<f64> = a.points().unwrap().iter().map(|n| n.to_f64(kind)).collect();
        assert_eq!(points, vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(a.sum().unwrap().to_f64(kind), 12.0);
    }

    #[test]
    fn empty_checkpoint_reports_no_data() {
        let desc = measure_descriptor();
        let agg = array();
        agg.checkpoint(&desc).unwrap();
        assert!(matches!(agg.min(), Err(MetricsError::NoDataCollected)));
        assert!(matches!(
            agg.quantile(0.5),
            Err(MetricsError::NoDataCollected)
        ));
        assert_eq!(agg.count().unwrap(), 0);
    }
}
