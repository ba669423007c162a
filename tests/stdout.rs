//! End-to-end rendering tests for the stdout JSON exporter.
use metric_checkpoint::aggregators::{
    array, ddsketch, last_value, min_max_sum_count, sum, DdSketchConfig,
};
use metric_checkpoint::export::{Aggregator, CheckpointSet, Exporter};
use metric_checkpoint::exporters::stdout::{StdoutExporter, StdoutExporterBuilder};
use metric_checkpoint::labels::default_encoder;
use metric_checkpoint::{
    Descriptor, InstrumentKind, Key, KeyValue, MetricsError, NumberKind,
};
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};

/// An `io::Write` that can be cloned into the exporter while the test keeps a
/// handle to inspect what was written.
#[derive(Clone, Debug, Default)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl SharedWriter {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Fixture {
    output: SharedWriter,
    exporter: StdoutExporter<SharedWriter>,
    checkpoint_set: CheckpointSet,
}

impl Fixture {
    fn new() -> Self {
        Fixture::build(|builder| builder)
    }

    fn build<F>(configure: F) -> Self
    where
        F: FnOnce(
            StdoutExporterBuilder<SharedWriter>,
        ) -> StdoutExporterBuilder<SharedWriter>,
    {
        let output = SharedWriter::default();
        let exporter = configure(
            StdoutExporterBuilder::new(output.clone()).with_do_not_print_time(true),
        )
        .try_build()
        .unwrap();
        Fixture {
            output,
            exporter,
            checkpoint_set: CheckpointSet::new(default_encoder()),
        }
    }

    fn export(&self) -> String {
        self.exporter.export(&self.checkpoint_set).unwrap();
        self.output.contents().trim().to_string()
    }
}

fn descriptor(instrument_kind: InstrumentKind, number_kind: NumberKind) -> Descriptor {
    Descriptor::new("test.name".into(), instrument_kind, number_kind)
}

fn ab_cd() -> Vec<KeyValue> {
    vec![KeyValue::new("A", "B"), KeyValue::new("C", "D")]
}

#[test]
fn invalid_quantiles_fail_at_build_time() {
    let result = StdoutExporterBuilder::new(Vec::new())
        .with_quantiles(vec![1.1, 0.9])
        .try_build();
    assert!(matches!(result, Err(MetricsError::InvalidQuantile)));

    assert!(StdoutExporterBuilder::new(Vec::new())
        .with_quantiles(vec![0.9])
        .try_build()
        .is_ok());
}

#[test]
fn counter_format() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Counter, NumberKind::I64);
    let agg = sum();
    agg.update(&123i64.into(), &desc).unwrap();
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set.add(&desc, Arc::new(agg), &ab_cd());

    assert_eq!(
        fix.export(),
        r#"{"updates":[{"name":"test.name{A=B,C=D}","sum":123}]}"#
    );
}

#[test]
fn last_value_format() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Observer, NumberKind::F64);
    let agg = last_value();
    agg.update(&123.456.into(), &desc).unwrap();
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set.add(&desc, Arc::new(agg), &ab_cd());

    assert_eq!(
        fix.export(),
        r#"{"updates":[{"name":"test.name{A=B,C=D}","last":123.456}]}"#
    );
}

#[test]
fn min_max_sum_count_format() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Measure, NumberKind::F64);
    let agg = min_max_sum_count(&desc);
    agg.update(&123.456.into(), &desc).unwrap();
    agg.update(&876.543.into(), &desc).unwrap();
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set.add(&desc, Arc::new(agg), &ab_cd());

    assert_eq!(
        fix.export(),
        r#"{"updates":[{"name":"test.name{A=B,C=D}","min":123.456,"max":876.543,"sum":999.999,"count":2}]}"#
    );
}

#[test]
fn measure_format_includes_exact_quantiles() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Measure, NumberKind::F64);
    let agg = array();
    for i in 0..1000 {
        agg.update(&(i as f64 + 0.5).into(), &desc).unwrap();
    }
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set.add(&desc, Arc::new(agg), &ab_cd());

    let printed: Value = serde_json::from_str(&fix.export()).unwrap();
    assert_eq!(
        printed,
        json!({
            "updates": [
                {
                    "name": "test.name{A=B,C=D}",
                    "min": 0.5,
                    "max": 999.5,
                    "sum": 500000.0,
                    "count": 1000,
                    "quantiles": [
                        { "q": 0.5, "v": 500.5 },
                        { "q": 0.9, "v": 900.5 },
                        { "q": 0.99, "v": 990.5 }
                    ]
                }
            ]
        })
    );
}

#[test]
fn empty_data_sets_render_null_updates() {
    let desc = descriptor(InstrumentKind::Measure, NumberKind::F64);
    let aggs: Vec<Arc<dyn Aggregator + Send + Sync>> = vec![
        Arc::new(ddsketch(&DdSketchConfig::default(), NumberKind::F64)),
        Arc::new(min_max_sum_count(&desc)),
    ];
    for agg in aggs {
        let mut fix = Fixture::new();
        agg.checkpoint(&desc).unwrap();
        fix.checkpoint_set.add(&desc, agg, &[]);
        assert_eq!(fix.export(), r#"{"updates":null}"#);
    }
}

#[test]
fn unset_last_value_renders_null_updates() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Observer, NumberKind::F64);
    let agg = last_value();
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set.add(&desc, Arc::new(agg), &ab_cd());

    assert_eq!(fix.export(), r#"{"updates":null}"#);
}

#[test]
fn declared_but_unset_keys_render_bare() {
    let mut fix = Fixture::new();
    let desc = descriptor(InstrumentKind::Counter, NumberKind::I64)
        .with_keys(vec![Key::new("C"), Key::new("D")]);
    let agg = sum();
    agg.update(&10i64.into(), &desc).unwrap();
    agg.checkpoint(&desc).unwrap();
    fix.checkpoint_set
        .add(&desc, Arc::new(agg), &[KeyValue::new("A", "B")]);

    assert_eq!(
        fix.export(),
        r#"{"updates":[{"name":"test.name{A=B,C,D}","sum":10}]}"#
    );
}

#[test]
fn timestamps_are_rfc3339_and_ordered() {
    let output = SharedWriter::default();
    let exporter = StdoutExporterBuilder::new(output.clone())
        .try_build()
        .unwrap();

    let before = chrono::Utc::now();

    let desc = descriptor(InstrumentKind::Observer, NumberKind::I64);
    let agg = last_value();
    agg.update(&321i64.into(), &desc).unwrap();
    agg.checkpoint(&desc).unwrap();

    let mut checkpoint_set = CheckpointSet::new(default_encoder());
    checkpoint_set.add(&desc, Arc::new(agg), &[]);
    exporter.export(&checkpoint_set).unwrap();

    let after = chrono::Utc::now();

    let printed: Value = serde_json::from_str(output.contents().trim()).unwrap();
    let export_time = chrono::DateTime::parse_from_rfc3339(printed["time"].as_str().unwrap())
        .unwrap()
        .with_timezone(&chrono::Utc);
    let update_time = chrono::DateTime::parse_from_rfc3339(
        printed["updates"][0]["time"].as_str().unwrap(),
    )
    .unwrap()
    .with_timezone(&chrono::Utc);

    assert!(before <= update_time);
    assert!(update_time <= export_time);
    assert!(export_time <= after);
    assert_eq!(printed["updates"][0]["last"], json!(321));
}
