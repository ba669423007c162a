//! Metric aggregators: one per aggregation strategy, all implementing the
//! [`Aggregator`](crate::export::Aggregator) contract.
use crate::metrics::{Descriptor, MetricsError, Number, NumberKind, Result};

mod array;
mod ddsketch;
mod histogram;
mod last_value;
mod min_max_sum_count;
mod sum;

pub use array::{array, ArrayAggregator};
pub use ddsketch::{ddsketch, DdSketchAggregator, DdSketchConfig};
pub use histogram::{histogram, HistogramAggregator};
pub use last_value::{last_value, LastValueAggregator};
pub use min_max_sum_count::{min_max_sum_count, MinMaxSumCountAggregator};
pub use sum::{sum, SumAggregator};

/// Validate a raw value against its descriptor before it is folded into an
/// aggregation. Rejected values leave the aggregator untouched.
pub fn range_test(number: &Number, descriptor: &Descriptor) -> Result<()> {
    if descriptor.number_kind() == &NumberKind::F64 && number.is_nan() {
        return Err(MetricsError::NaNInput);
    }
    Ok(())
}
