//! Grouping and generation semantics of `CheckpointSet`.
use metric_checkpoint::aggregators::sum;
use metric_checkpoint::export::{Aggregator, CheckpointSet, Sum};
use metric_checkpoint::labels::default_encoder;
use metric_checkpoint::{Descriptor, InstrumentKind, KeyValue, NumberKind};
use std::sync::Arc;

fn counter(name: &str) -> Descriptor {
    Descriptor::new(name.into(), InstrumentKind::Counter, NumberKind::I64)
}

fn checkpointed_sum(value: i64, desc: &Descriptor) -> Arc<dyn Aggregator + Send + Sync> {
    let agg = sum();
    agg.update(&value.into(), desc).unwrap();
    agg.checkpoint(desc).unwrap();
    Arc::new(agg)
}

#[test]
fn same_identity_returns_existing_aggregator() {
    let mut set = CheckpointSet::new(default_encoder());
    let desc = counter("requests");

    let first = checkpointed_sum(10, &desc);
    let (stored, added) = set.add(&desc, first, &[KeyValue::new("A", "B"), KeyValue::new("C", "D")]);
    assert!(added);

    // The same pairs in a different order are the same identity; the caller
    // gets the existing aggregator back and folds the new one into it.
    let second = checkpointed_sum(5, &desc);
    let (existing, added) = set.add(
        &desc,
        second.clone(),
        &[KeyValue::new("C", "D"), KeyValue::new("A", "B")],
    );
    assert!(!added);
    assert!(Arc::ptr_eq(&stored, &existing));

    existing.merge(second.as_ref(), &desc).unwrap();

    assert_eq!(set.len(), 1);
    set.try_for_each(&mut |record| {
        let agg = record
            .aggregator()
            .as_any()
            .downcast_ref::<metric_checkpoint::aggregators::SumAggregator>()
            .unwrap();
        assert_eq!(agg.sum()?.to_i64(&NumberKind::I64), 15);
        Ok(())
    })
    .unwrap();
}

#[test]
fn distinct_label_values_are_distinct_records() {
    let mut set = CheckpointSet::new(default_encoder());
    let desc = counter("requests");

    let (_, added_a) = set.add(&desc, checkpointed_sum(1, &desc), &[KeyValue::new("host", "a")]);
    let (_, added_b) = set.add(&desc, checkpointed_sum(1, &desc), &[KeyValue::new("host", "b")]);
    assert!(added_a);
    assert!(added_b);
    assert_eq!(set.len(), 2);
}

#[test]
fn records_iterate_in_first_insertion_order() {
    let mut set = CheckpointSet::new(default_encoder());
    for name in ["gamma", "alpha", "beta"] {
        let desc = counter(name);
        set.add(&desc, checkpointed_sum(1, &desc), &[]);
    }
    // Re-adding an existing identity must not move it.
    let desc = counter("gamma");
    set.add(&desc, checkpointed_sum(1, &desc), &[]);

    let mut names = Vec::new();
    set.try_for_each(&mut |record| {
        names.push(record.descriptor().name().to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(names, ["gamma", "alpha", "beta"]);
}

#[test]
fn reset_starts_a_new_generation() {
    let mut set = CheckpointSet::new(default_encoder());
    let desc = counter("requests");
    set.add(&desc, checkpointed_sum(7, &desc), &[]);
    assert!(!set.is_empty());

    set.reset();
    assert!(set.is_empty());
    assert_eq!(set.len(), 0);

    // The identity from the previous generation inserts fresh.
    let (_, added) = set.add(&desc, checkpointed_sum(3, &desc), &[]);
    assert!(added);
}
