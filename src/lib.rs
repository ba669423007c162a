//! In-process metric aggregation and checkpointing.
//!
//! This crate implements the collection half of a metrics pipeline: measured
//! values flow into per-instrument [`Aggregator`]s, a periodic checkpoint
//! rotates each aggregator's live state into an immutable snapshot, and a
//! [`CheckpointSet`] groups the snapshots by instrument and label set for an
//! [`Exporter`] to render.
//!
//! [`Aggregator`]: crate::export::Aggregator
//! [`CheckpointSet`]: crate::export::CheckpointSet
//! [`Exporter`]: crate::export::Exporter
//!
//! Aggregation strategies range from a lock-free sum to exact and
//! approximate value distributions; the [`selectors`] module chooses one per
//! instrument. All aggregators accept concurrent updates and merge
//! associatively, so data can be sharded during collection and combined at
//! export time.
//!
//! # Examples
//!
//! ```
//! use metric_checkpoint::export::{Aggregator, AggregatorSelector, CheckpointSet, Exporter};
//! use metric_checkpoint::exporters::stdout::StdoutExporterBuilder;
//! use metric_checkpoint::labels::default_encoder;
//! use metric_checkpoint::selectors::simple::Selector;
//! use metric_checkpoint::{Descriptor, InstrumentKind, KeyValue, NumberKind};
//!
//! # fn main() -> metric_checkpoint::Result<()> {
//! let descriptor = Descriptor::new(
//!     "requests.total".into(),
//!     InstrumentKind::Counter,
//!     NumberKind::U64,
//! );
//!
//! let aggregator = Selector::Inexpensive
//!     .aggregator_for(&descriptor)
//!     .expect("counters are never disabled");
//! aggregator.update(&1u64.into(), &descriptor)?;
//! aggregator.checkpoint(&descriptor)?;
//!
//! let mut checkpoint_set = CheckpointSet::new(default_encoder());
//! checkpoint_set.add(&descriptor, aggregator, &[KeyValue::new("host", "a")]);
//!
//! let exporter = StdoutExporterBuilder::new(Vec::new())
//!     .with_do_not_print_time(true)
//!     .try_build()?;
//! exporter.export(&checkpoint_set)?;
//! # Ok(())
//! # }
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]

pub mod aggregators;
pub mod core;
pub mod export;
pub mod exporters;
pub mod global;
pub mod labels;
pub mod metrics;
pub mod selectors;

pub use crate::core::{Key, KeyValue, Unit, Value};
pub use crate::metrics::{
    Descriptor, InstrumentKind, MetricsError, Number, NumberKind, Result,
};
