//! The aggregation contract and the checkpoint data structures handed to
//! exporters.
use crate::labels;
use crate::metrics::{Descriptor, Number, Result};
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

mod aggregation;

pub use aggregation::{
    Buckets, Count, Distribution, Histogram, LastValue, Max, Min, MinMaxSumCount, Points, Quantile,
    Sum,
};

/// Aggregator implements a specific aggregation behavior, i.e., a behavior to
/// track a sequence of updates to an instrument. Sum-only instruments commonly
/// use a simple Sum aggregator, but for the distribution instruments
/// (Measure, Observer) there are a number of possible aggregators with
/// different cost and accuracy tradeoffs.
///
/// Every aggregator holds two states: the live accumulation fed by `update`,
/// and the checkpointed snapshot read by exporters. `checkpoint` atomically
/// rotates the former into the latter.
pub trait Aggregator: fmt::Debug {
    /// Update receives a new measured value and incorporates it into the live
    /// aggregation. Update calls may arrive concurrently from any number of
    /// threads; the fold is commutative and associative, no ordering between
    /// concurrent updates may be assumed.
    ///
    /// `Descriptor::number_kind` should be consulted to determine whether the
    /// provided number is an `i64`, `u64` or `f64`. A rejected update (e.g.
    /// NaN input) leaves the aggregator unchanged.
    fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()>;

    /// Called during collection to finish one period of aggregation by
    /// atomically rotating the live state into the checkpointed snapshot and
    /// resetting the live state.
    ///
    /// `checkpoint` races with in-flight `update` calls; the two are
    /// synchronized with respect to each other inside each implementation.
    /// An aggregator that never received an update checkpoints a well-defined
    /// empty snapshot rather than failing.
    fn checkpoint(&self, descriptor: &Descriptor) -> Result<()>;

    /// Combines the checkpointed state of the `other` aggregator into this
    /// one's checkpoint. Merging is associative and commutative, and produces
    /// the same result as if every update folded into `other` had been folded
    /// into `self` directly.
    ///
    /// Fails with `InconsistentAggregator` when `other` is not the same
    /// concrete kind, leaving both operands unchanged.
    fn merge(&self, other: &(dyn Aggregator + Send + Sync), descriptor: &Descriptor) -> Result<()>;

    /// Returns the implementing aggregator as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// AggregatorSelector supports selecting the kind of `Aggregator` to use at
/// runtime for a specific metric instrument.
///
/// The selector is consulted exactly once per newly observed (instrument,
/// label set) pair, when its aggregator is instantiated. It must return a
/// consistent type for a given descriptor, because aggregators only know how
/// to merge with their own kind.
pub trait AggregatorSelector: fmt::Debug {
    /// Allocate an aggregator suited to the given instrument.
    ///
    /// When the call returns `None`, the metric instrument is explicitly
    /// disabled. This call does not block.
    fn aggregator_for(&self, descriptor: &Descriptor) -> Option<Arc<dyn Aggregator + Send + Sync>>;
}

/// Exporter handles presentation of a checkpoint of aggregated metrics. This
/// is the final stage of the pipeline, where metric data are rendered for a
/// specific system.
///
/// A conforming exporter reads records through [`CheckpointSet::try_for_each`]
/// and must not mutate aggregator state reached through a record.
pub trait Exporter: fmt::Debug {
    /// Export is called after completing a collection pass, with the
    /// checkpoint set the collection produced.
    fn export(&self, checkpoint_set: &CheckpointSet) -> Result<()>;
}

/// Record contains the exported data for a single metric instrument and label
/// set: the atomic unit handed to an exporter. The descriptor and labels never
/// change after creation, and the aggregator is exclusively owned by this
/// record for the remainder of its checkpoint generation.
#[derive(Debug)]
pub struct Record {
    descriptor: Descriptor,
    labels: labels::Set,
    aggregator: Arc<dyn Aggregator + Send + Sync>,
}

impl Record {
    /// Create a new `Record` instance.
    pub fn new(
        descriptor: Descriptor,
        labels: labels::Set,
        aggregator: Arc<dyn Aggregator + Send + Sync>,
    ) -> Self {
        Record {
            descriptor,
            labels,
            aggregator,
        }
    }

    /// The descriptor for this metric.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The labels for this metric.
    pub fn labels(&self) -> &labels::Set {
        &self.labels
    }

    /// The checkpointed aggregator for this metric.
    pub fn aggregator(&self) -> &Arc<dyn Aggregator + Send + Sync> {
        &self.aggregator
    }
}

/// CheckpointSet is the snapshot/merge structure produced by one collection
/// pass and consumed by an exporter.
///
/// Records are grouped by the derived key `name + "_" + encoded-labels`; the
/// encoder's determinism contract is what keeps distinct label sets from
/// colliding. Within one generation at most one record is live per key, and
/// iteration visits records in first-insertion order.
///
/// The set is driven from a single collection path; parallel collection
/// shards must serialize access around [`CheckpointSet::add`].
#[derive(Debug)]
pub struct CheckpointSet {
    encoder: Box<dyn labels::Encoder + Send + Sync>,
    records: HashMap<String, usize>,
    updates: Vec<Record>,
}

impl CheckpointSet {
    /// Create a new empty `CheckpointSet` grouping by the given encoder.
    pub fn new(encoder: Box<dyn labels::Encoder + Send + Sync>) -> Self {
        CheckpointSet {
            encoder,
            records: HashMap::new(),
            updates: Vec::new(),
        }
    }

    /// Add a checkpointed aggregator for the given instrument and label set.
    ///
    /// If no record exists for the identity, the aggregator is inserted and
    /// returned with `true`. If one exists, the *existing* aggregator is
    /// returned with `false` and the caller is responsible for merging the new
    /// data into it: the set never merges itself, keeping the merge
    /// numeric-kind-aware and caller-controlled.
    pub fn add(
        &mut self,
        descriptor: &Descriptor,
        aggregator: Arc<dyn Aggregator + Send + Sync>,
        labels: &[crate::core::KeyValue],
    ) -> (Arc<dyn Aggregator + Send + Sync>, bool) {
        let labels = labels::Set::from(labels);
        let encoded = labels.encoded(Some(self.encoder.as_ref()));
        let key = format!("{}_{}", descriptor.name(), encoded);

        match self.records.entry(key) {
            Entry::Occupied(entry) => (self.updates[*entry.get()].aggregator.clone(), false),
            Entry::Vacant(entry) => {
                entry.insert(self.updates.len());
                self.updates
                    .push(Record::new(descriptor.clone(), labels, aggregator.clone()));
                (aggregator, true)
            }
        }
    }

    /// Visit the records of the current generation in first-insertion order.
    ///
    /// Zero records is an empty visitation, not an error. The first error
    /// returned by `f` halts iteration and is returned to the caller.
    pub fn try_for_each(&self, f: &mut dyn FnMut(&Record) -> Result<()>) -> Result<()> {
        self.updates.iter().try_for_each(|record| f(record))
    }

    /// The number of live records in the current generation.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether the current generation holds no records.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Clear all records, starting a new checkpoint generation.
    ///
    /// Aggregator references obtained through [`CheckpointSet::add`] in
    /// previous generations must not be updated after this call.
    pub fn reset(&mut self) {
        self.records.clear();
        self.updates.clear();
    }
}
