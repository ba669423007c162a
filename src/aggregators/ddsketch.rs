//! DDSketch quantile sketch with relative-error guarantees.
//!
//! A fast, fully-mergeable quantile sketch; the algorithm is described in
//! <https://arxiv.org/pdf/1908.10693>. Unlike rank-accuracy sketches, the
//! error bound is *relative* to the queried value, which behaves well on
//! long-tailed distributions: for any 0 <= q <= 1 the reported quantile is
//! within a factor of (1 + alpha) of the true one.
use crate::aggregators::range_test;
use crate::export::{
    Aggregator, Count, Distribution, Max, Min, MinMaxSumCount, Quantile, Sum,
};
use crate::metrics::{Descriptor, MetricsError, Number, NumberKind, Result};
use std::any::Any;
use std::cmp::Ordering;
use std::mem;
use std::sync::RwLock;

const INITIAL_NUM_BINS: usize = 128;
const GROW_LEFT_BY: i64 = 128;

const DEFAULT_MAX_NUM_BINS: i64 = 2048;
const DEFAULT_ALPHA: f64 = 0.01;
const DEFAULT_KEY_EPSILON: f64 = 1.0e-9;

/// Create a new `DdSketchAggregator` for the given numeric kind.
pub fn ddsketch(config: &DdSketchConfig, kind: NumberKind) -> DdSketchAggregator {
    DdSketchAggregator::new(config, kind)
}

/// Configuration of the sketch's error/memory tradeoff.
#[derive(Clone, Debug)]
pub struct DdSketchConfig {
    /// Relative error tolerance alpha: quantile answers are within a factor
    /// of (1 + alpha) of the true value.
    pub alpha: f64,
    /// Upper bound on the number of bins; once reached, the lowest bins
    /// collapse together, trading accuracy near the minimum for memory.
    pub max_num_bins: i64,
    /// Values in [-key_epsilon, key_epsilon] all map to the zero bin.
    pub key_epsilon: f64,
}

impl DdSketchConfig {
    /// Create a new config with the given parameters.
    pub fn new(alpha: f64, max_num_bins: i64, key_epsilon: f64) -> Self {
        DdSketchConfig {
            alpha,
            max_num_bins,
            key_epsilon,
        }
    }
}

impl Default for DdSketchConfig {
    fn default() -> Self {
        DdSketchConfig::new(DEFAULT_ALPHA, DEFAULT_MAX_NUM_BINS, DEFAULT_KEY_EPSILON)
    }
}

/// An approximate-distribution aggregator bounded by a configured relative
/// error tolerance.
///
/// All state sits behind one `RwLock`: updates, checkpoints and merges take
/// the write half, quantile queries the read half.
#[derive(Debug)]
pub struct DdSketchAggregator {
    inner: RwLock<Inner>,
}

impl DdSketchAggregator {
    /// Create a new `DdSketchAggregator`.
    pub fn new(config: &DdSketchConfig, kind: NumberKind) -> DdSketchAggregator {
        DdSketchAggregator {
            inner: RwLock::new(Inner::new(config, kind)),
        }
    }
}

impl Default for DdSketchAggregator {
    fn default() -> Self {
        DdSketchAggregator::new(&DdSketchConfig::default(), NumberKind::F64)
    }
}

impl Sum for DdSketchAggregator {
    fn sum(&self) -> Result<Number> {
        self.inner
            .read()
            .map_err(From::from)
            .map(|inner| inner.checkpoint.sum.clone())
    }
}

impl Min for DdSketchAggregator {
    fn min(&self) -> Result<Number> {
        self.inner.read().map_err(From::from).and_then(|inner| {
            if inner.checkpoint.store.count == 0 {
                return Err(MetricsError::NoDataCollected);
            }
            Ok(inner.checkpoint.min_value.clone())
        })
    }
}

impl Max for DdSketchAggregator {
    fn max(&self) -> Result<Number> {
        self.inner.read().map_err(From::from).and_then(|inner| {
            if inner.checkpoint.store.count == 0 {
                return Err(MetricsError::NoDataCollected);
            }
            Ok(inner.checkpoint.max_value.clone())
        })
    }
}

impl Count for DdSketchAggregator {
    fn count(&self) -> Result<u64> {
        self.inner
            .read()
            .map_err(From::from)
            .map(|inner| inner.checkpoint.store.count)
    }
}

impl MinMaxSumCount for DdSketchAggregator {}

impl Distribution for DdSketchAggregator {}

impl Quantile for DdSketchAggregator {
    fn quantile(&self, q: f64) -> Result<Number> {
        if !(0.0..=1.0).contains(&q) {
            return Err(MetricsError::InvalidQuantile);
        }
        self.inner.read().map_err(From::from).and_then(|inner| {
            let snapshot = &inner.checkpoint;
            if snapshot.store.count == 0 {
                return Err(MetricsError::NoDataCollected);
            }
            if q == 0.0 {
                return Ok(snapshot.min_value.clone());
            }
            if (q - 1.0).abs() < f64::EPSILON {
                return Ok(snapshot.max_value.clone());
            }

            let rank = (q * (snapshot.store.count - 1) as f64).ceil() as u64 + 1;
            let mut key = snapshot.store.key_at_rank(rank);

            // Invert the key mapping: the representative value of key k is
            // 2·γ^k/(γ + 1), the midpoint of its bucket in relative error.
            let quantile_val = match key.cmp(&0) {
                Ordering::Less => {
                    key += inner.offset;
                    -2.0 * ((-key as f64) * inner.gamma_ln).exp() / (1.0 + inner.gamma)
                }
                Ordering::Greater => {
                    key -= inner.offset;
                    2.0 * ((key as f64) * inner.gamma_ln).exp() / (1.0 + inner.gamma)
                }
                Ordering::Equal => 0f64,
            };

            let mut quantile = match inner.kind {
                NumberKind::F64 => Number::from(quantile_val),
                NumberKind::U64 => Number::from(quantile_val as u64),
                NumberKind::I64 => Number::from(quantile_val as i64),
            };

            // Clamp the result into [min_value, max_value].
            if quantile.partial_cmp(&inner.kind, &snapshot.min_value) == Some(Ordering::Less) {
                quantile = snapshot.min_value.clone();
            }
            if quantile.partial_cmp(&inner.kind, &snapshot.max_value) == Some(Ordering::Greater) {
                quantile = snapshot.max_value.clone();
            }

            Ok(quantile)
        })
    }
}

impl Aggregator for DdSketchAggregator {
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        range_test(number, descriptor)?;
        self.inner
            .write()
            .map_err(From::from)
            .map(|mut inner| inner.add(number, descriptor.number_kind()))
    }

    fn checkpoint(&self, _descriptor: &Descriptor) -> Result<()> {
        self.inner.write().map_err(From::from).map(|mut inner| {
            let empty = SketchState::empty(&inner.kind, inner.max_num_bins);
            inner.checkpoint = mem::replace(&mut inner.current, empty);
        })
    }

    fn merge(
        &self,
        other: &(dyn Aggregator + Send + Sync),
        _descriptor: &Descriptor,
    ) -> Result<()> {
        if let Some(other) = other.as_any().downcast_ref::<DdSketchAggregator>() {
            self.inner.write().map_err(From::from).and_then(|mut inner| {
                other.inner.read().map_err(From::from).and_then(|other| {
                    if inner.max_num_bins != other.max_num_bins {
                        return Err(MetricsError::InconsistentAggregator(format!(
                            "Cannot merge sketches with different max bin counts: {} and {}",
                            inner.max_num_bins, other.max_num_bins
                        )));
                    }
                    if (inner.gamma - other.gamma).abs() > f64::EPSILON {
                        return Err(MetricsError::InconsistentAggregator(format!(
                            "Cannot merge sketches with different gamma: {} and {}",
                            inner.gamma, other.gamma
                        )));
                    }

                    if other.checkpoint.store.count == 0 {
                        return Ok(());
                    }
                    if inner.checkpoint.store.count == 0 {
                        inner.checkpoint = other.checkpoint.clone();
                        return Ok(());
                    }

                    let kind = inner.kind.clone();
                    inner.checkpoint.store.merge(&other.checkpoint.store);
                    inner
                        .checkpoint
                        .sum
                        .saturating_add(&kind, &other.checkpoint.sum);
                    if inner
                        .checkpoint
                        .min_value
                        .partial_cmp(&kind, &other.checkpoint.min_value)
                        == Some(Ordering::Greater)
                    {
                        inner.checkpoint.min_value = other.checkpoint.min_value.clone();
                    }
                    if inner
                        .checkpoint
                        .max_value
                        .partial_cmp(&kind, &other.checkpoint.max_value)
                        == Some(Ordering::Less)
                    {
                        inner.checkpoint.max_value = other.checkpoint.max_value.clone();
                    }
                    Ok(())
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

/// Sketch state plus the key-mapping parameters. Not thread-safe on its own;
/// all access goes through the aggregator's lock.
#[derive(Debug)]
struct Inner {
    kind: NumberKind,
    // γ = (1 + α)/(1 - α)
    gamma: f64,
    // ln(γ)
    gamma_ln: f64,
    // Values within [-key_epsilon, key_epsilon] fall into the zero key.
    key_epsilon: f64,
    // Shifts keys so that positive values above key_epsilon map to keys >= 1
    // and negative ones to keys <= -1.
    offset: i64,
    max_num_bins: i64,
    current: SketchState,
    checkpoint: SketchState,
}

impl Inner {
    fn new(config: &DdSketchConfig, kind: NumberKind) -> Inner {
        let gamma: f64 = 1.0 + 2.0 * config.alpha / (1.0 - config.alpha);
        let gamma_ln = gamma.ln();
        let offset = -(config.key_epsilon.ln() / gamma_ln).ceil() as i64 + 1i64;
        Inner {
            current: SketchState::empty(&kind, config.max_num_bins),
            checkpoint: SketchState::empty(&kind, config.max_num_bins),
            gamma,
            gamma_ln,
            key_epsilon: config.key_epsilon,
            offset,
            max_num_bins: config.max_num_bins,
            kind,
        }
    }

    fn add(&mut self, v: &Number, kind: &NumberKind) {
        let key = self.key(v, kind);
        self.current.store.add(key);

        if self.current.min_value.partial_cmp(&self.kind, v) == Some(Ordering::Greater) {
            self.current.min_value = v.clone();
        }
        if self.current.max_value.partial_cmp(&self.kind, v) == Some(Ordering::Less) {
            self.current.max_value = v.clone();
        }
        self.current.sum.saturating_add(&self.kind, v);
    }

    fn key(&self, num: &Number, kind: &NumberKind) -> i64 {
        let value = num.to_f64(kind);
        if value < -self.key_epsilon {
            -(self.log_gamma(-value).ceil() as i64) - self.offset
        } else if value > self.key_epsilon {
            self.log_gamma(value).ceil() as i64 + self.offset
        } else {
            0i64
        }
    }

    /// The bucket index of a positive value, before offsetting.
    fn log_gamma(&self, num: f64) -> f64 {
        num.ln() / self.gamma_ln
    }
}

#[derive(Clone, Debug)]
struct SketchState {
    store: BinStore,
    sum: Number,
    min_value: Number,
    max_value: Number,
}

impl SketchState {
    fn empty(kind: &NumberKind, max_num_bins: i64) -> Self {
        SketchState {
            store: BinStore::new(max_num_bins),
            sum: kind.zero(),
            // Sentinels; any recorded value replaces them.
            min_value: kind.max(),
            max_value: kind.min(),
        }
    }
}

/// A contiguous window of bins over the key space. When the window would
/// exceed `max_num_bins`, the lowest keys collapse together into the lowest
/// retained bin, preserving total count.
#[derive(Clone, Debug)]
struct BinStore {
    bins: Vec<u64>,
    count: u64,
    min_key: i64,
    max_key: i64,
    max_num_bins: i64,
}

impl BinStore {
    fn new(max_num_bins: i64) -> BinStore {
        BinStore {
            bins: vec![0; INITIAL_NUM_BINS],
            count: 0u64,
            min_key: 0i64,
            max_key: 0i64,
            max_num_bins,
        }
    }

    /// Add one observation of `key`, expanding the window as needed.
    ///
    /// Invariant kept by every path: `bins.len() == max_key - min_key + 1`.
    fn add(&mut self, key: i64) {
        if self.count == 0 {
            self.max_key = key;
            self.min_key = key - self.bins.len() as i64 + 1;
        } else if key < self.min_key {
            self.grow_left(key);
        } else if key > self.max_key {
            self.grow_right(key);
        }
        // grow_left may refuse at capacity, in which case the key collapses
        // into the lowest retained bin.
        let idx = (key - self.min_key).max(0) as usize;
        self.bins[idx] += 1;
        self.count += 1;
    }

    fn grow_left(&mut self, key: i64) {
        if key >= self.min_key || self.bins.len() >= self.max_num_bins as usize {
            return;
        }

        let mut min_key = self.min_key;
        while min_key > key {
            min_key -= GROW_LEFT_BY;
        }
        // Never let the window exceed capacity.
        min_key = min_key.max(self.max_key - self.max_num_bins + 1);

        let expected_len = (self.max_key - min_key + 1) as usize;
        let mut new_bins = vec![0u64; expected_len];
        new_bins[(self.min_key - min_key) as usize..].copy_from_slice(&self.bins);

        self.bins = new_bins;
        self.min_key = min_key;
    }

    fn grow_right(&mut self, key: i64) {
        if key <= self.max_key {
            return;
        }

        if key - self.max_key >= self.max_num_bins {
            // The whole existing window falls below the new one; everything
            // collapses into its lowest bin.
            let total = self.bins.iter().sum();
            self.bins = vec![0; self.max_num_bins as usize];
            self.max_key = key;
            self.min_key = key - self.max_num_bins + 1;
            self.bins[0] = total;
        } else if key - self.min_key >= self.max_num_bins {
            // Slide the window right, folding the bins that fall off the left
            // edge into the new lowest bin.
            let new_min_key = key - self.max_num_bins + 1;
            let dropped: u64 = self
                .bins
                .iter()
                .take((new_min_key - self.min_key) as usize)
                .sum();
            self.bins.drain(0..(new_min_key - self.min_key) as usize);
            self.bins.resize(self.max_num_bins as usize, 0);
            self.min_key = new_min_key;
            self.max_key = key;
            self.bins[0] += dropped;
        } else {
            self.bins.resize((key - self.min_key + 1) as usize, 0);
            self.max_key = key;
        }
    }

    /// Returns the key of the value at `rank` (1-based, in key order).
    fn key_at_rank(&self, rank: u64) -> i64 {
        self.bins
            .iter()
            .enumerate()
            .scan(0, |accumulated, (idx, &count)| {
                *accumulated += count;
                Some((idx, *accumulated))
            })
            .find(|(_idx, accumulated)| *accumulated >= rank)
            .map(|(idx, _)| idx as i64 + self.min_key)
            .unwrap_or(self.max_key)
    }

    /// Fold another store's counts into this one. Keys outside this store's
    /// (possibly capacity-limited) window collapse into the lowest bin.
    fn merge(&mut self, other: &BinStore) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        self.grow_left(other.min_key);
        self.grow_right(other.max_key);

        for (idx, &count) in other.bins.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let key = other.min_key + idx as i64;
            let own_idx = (key - self.min_key).max(0) as usize;
            self.bins[own_idx] += count;
        }
        self.count += other.count;
    }
}
