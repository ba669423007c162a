//! Line-oriented JSON exporter, intended for debugging and tests.
//!
//! Each export pass writes one JSON object: an optional wall-clock `time` and
//! an `updates` array with one line per record. An export with no renderable
//! records still writes `{"updates":null}` so consumers can observe empty
//! collection passes.
use crate::aggregators::{
    ArrayAggregator, DdSketchAggregator, HistogramAggregator, LastValueAggregator,
    MinMaxSumCountAggregator, SumAggregator,
};
use crate::export::{
    CheckpointSet, Count, Distribution, Exporter, Histogram, LastValue, MinMaxSumCount, Record, Sum,
};
use crate::labels::{default_encoder, Encoder};
use crate::metrics::{MetricsError, Number, NumberKind, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Create a builder for an exporter that writes to stdout.
pub fn stdout() -> StdoutExporterBuilder<io::Stdout> {
    StdoutExporterBuilder::new(io::stdout())
}

/// Configures a [`StdoutExporter`].
pub struct StdoutExporterBuilder<W: Write> {
    writer: W,
    pretty_print: bool,
    do_not_print_time: bool,
    quantiles: Option<Vec<f64>>,
    label_encoder: Option<Box<dyn Encoder + Send + Sync>>,
}

impl<W: Write> StdoutExporterBuilder<W> {
    /// Create a builder writing to the given destination.
    pub fn new(writer: W) -> Self {
        StdoutExporterBuilder {
            writer,
            pretty_print: false,
            do_not_print_time: false,
            quantiles: None,
            label_encoder: None,
        }
    }

    /// Swap the output destination.
    pub fn with_writer<W2: Write>(self, writer: W2) -> StdoutExporterBuilder<W2> {
        StdoutExporterBuilder {
            writer,
            pretty_print: self.pretty_print,
            do_not_print_time: self.do_not_print_time,
            quantiles: self.quantiles,
            label_encoder: self.label_encoder,
        }
    }

    /// Emit indented JSON instead of one compact line.
    pub fn with_pretty_print(self, pretty_print: bool) -> Self {
        StdoutExporterBuilder {
            pretty_print,
            ..self
        }
    }

    /// Suppress all timestamps in the output, for reproducible tests.
    pub fn with_do_not_print_time(self, do_not_print_time: bool) -> Self {
        StdoutExporterBuilder {
            do_not_print_time,
            ..self
        }
    }

    /// The quantiles to report for distribution aggregators. Defaults to
    /// 0.5, 0.9 and 0.99.
    pub fn with_quantiles(self, quantiles: Vec<f64>) -> Self {
        StdoutExporterBuilder {
            quantiles: Some(quantiles),
            ..self
        }
    }

    /// The encoder used to render each record's label set.
    pub fn with_label_encoder<E>(self, label_encoder: E) -> Self
    where
        E: Encoder + Send + Sync + 'static,
    {
        StdoutExporterBuilder {
            label_encoder: Some(Box::new(label_encoder)),
            ..self
        }
    }

    /// Build the exporter, validating the configured quantiles.
    pub fn try_build(self) -> Result<StdoutExporter<W>> {
        let quantiles = self.quantiles.unwrap_or_else(|| DEFAULT_QUANTILES.to_vec());
        if quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
            return Err(MetricsError::InvalidQuantile);
        }
        Ok(StdoutExporter {
            writer: Mutex::new(self.writer),
            pretty_print: self.pretty_print,
            do_not_print_time: self.do_not_print_time,
            quantiles,
            label_encoder: self.label_encoder.unwrap_or_else(default_encoder),
        })
    }
}

impl<W: Write> fmt::Debug for StdoutExporterBuilder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutExporterBuilder")
            .field("pretty_print", &self.pretty_print)
            .field("do_not_print_time", &self.do_not_print_time)
            .field("quantiles", &self.quantiles)
            .finish()
    }
}

/// An [`Exporter`] that renders every record of a checkpoint set as one JSON
/// line on the configured writer.
pub struct StdoutExporter<W: Write> {
    writer: Mutex<W>,
    pretty_print: bool,
    do_not_print_time: bool,
    quantiles: Vec<f64>,
    label_encoder: Box<dyn Encoder + Send + Sync>,
}

impl<W: Write> fmt::Debug for StdoutExporter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutExporter")
            .field("pretty_print", &self.pretty_print)
            .field("do_not_print_time", &self.do_not_print_time)
            .field("quantiles", &self.quantiles)
            .finish()
    }
}

#[derive(Serialize)]
struct ExportBatch {
    #[serde(rename = "time", skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    // Serialized even when `None`, so an empty pass prints "updates":null.
    updates: Option<Vec<ExportLine>>,
}

#[derive(Default, Serialize)]
struct ExportLine {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sum: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(rename = "last", skip_serializing_if = "Option::is_none")]
    last_value: Option<serde_json::Value>,
    #[serde(rename = "time", skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantiles: Option<Vec<ExportQuantile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buckets: Option<ExportBuckets>,
}

#[derive(Serialize)]
struct ExportQuantile {
    q: f64,
    v: serde_json::Value,
}

#[derive(Serialize)]
struct ExportBuckets {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
}

impl<W: Write> Exporter for StdoutExporter<W> {
    fn export(&self, checkpoint_set: &CheckpointSet) -> Result<()> {
        let mut updates = Vec::new();
        checkpoint_set.try_for_each(&mut |record| match self.build_line(record) {
            Ok(line) => {
                updates.push(line);
                Ok(())
            }
            // Records whose checkpoint saw no updates are not rendered.
            Err(MetricsError::NoDataCollected) => Ok(()),
            Err(err) => Err(err),
        })?;

        let batch = ExportBatch {
            timestamp: if self.do_not_print_time {
                None
            } else {
                Some(Utc::now().to_rfc3339())
            },
            updates: if updates.is_empty() {
                None
            } else {
                Some(updates)
            },
        };

        let formatted = if self.pretty_print {
            serde_json::to_string_pretty(&batch)
        } else {
            serde_json::to_string(&batch)
        }
        .map_err(|err| MetricsError::Other(err.to_string()))?;

        let mut writer = self.writer.lock()?;
        writer
            .write_all(formatted.as_bytes())
            .map_err(|err| MetricsError::Other(err.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|err| MetricsError::Other(err.to_string()))
    }
}

impl<W: Write> StdoutExporter<W> {
    fn build_line(&self, record: &Record) -> Result<ExportLine> {
        let descriptor = record.descriptor();
        let kind = descriptor.number_kind();
        let any = record.aggregator().as_any();

        let mut line = ExportLine {
            name: self.render_name(record),
            ..Default::default()
        };

        if let Some(array) = any.downcast_ref::<ArrayAggregator>() {
            self.render_distribution(&mut line, array, kind)?;
        } else if let Some(sketch) = any.downcast_ref::<DdSketchAggregator>() {
            self.render_distribution(&mut line, sketch, kind)?;
        } else if let Some(mmsc) = any.downcast_ref::<MinMaxSumCountAggregator>() {
            render_min_max_sum_count(&mut line, mmsc, kind)?;
        } else if let Some(hist) = any.downcast_ref::<HistogramAggregator>() {
            let count = hist.count()?;
            if count == 0 {
                return Err(MetricsError::NoDataCollected);
            }
            let buckets = hist.histogram()?;
            line.sum = Some(number_to_value(&hist.sum()?, kind));
            line.count = Some(count);
            line.buckets = Some(ExportBuckets {
                boundaries: buckets.boundaries().to_vec(),
                counts: buckets.counts().to_vec(),
            });
        } else if let Some(lv) = any.downcast_ref::<LastValueAggregator>() {
            let (value, timestamp) = lv.last_value()?;
            line.last_value = Some(number_to_value(&value, kind));
            if !self.do_not_print_time {
                line.timestamp = Some(DateTime::<Utc>::from(timestamp).to_rfc3339());
            }
        } else if let Some(sum) = any.downcast_ref::<SumAggregator>() {
            line.sum = Some(number_to_value(&sum.sum()?, kind));
        } else {
            return Err(MetricsError::Other(format!(
                "Unsupported aggregator type: {:?}",
                record.aggregator()
            )));
        }

        Ok(line)
    }

    fn render_distribution<T>(
        &self,
        line: &mut ExportLine,
        agg: &T,
        kind: &NumberKind,
    ) -> Result<()>
    where
        T: Distribution,
    {
        render_min_max_sum_count(line, agg, kind)?;
        let mut quantiles = Vec::with_capacity(self.quantiles.len());
        for &q in &self.quantiles {
            quantiles.push(ExportQuantile {
                q,
                v: number_to_value(&agg.quantile(q)?, kind),
            });
        }
        line.quantiles = Some(quantiles);
        Ok(())
    }

    /// `name{encoded-labels}`, with the descriptor keys no label was supplied
    /// for appended bare, in declaration order.
    fn render_name(&self, record: &Record) -> String {
        let descriptor = record.descriptor();
        let labels = record.labels();

        let mut inner = labels.encoded(Some(self.label_encoder.as_ref()));
        for key in descriptor.keys() {
            if !labels.has_key(key) {
                if !inner.is_empty() {
                    inner.push(',');
                }
                inner.push_str(key.as_str());
            }
        }

        if inner.is_empty() {
            descriptor.name().to_string()
        } else {
            format!("{}{{{}}}", descriptor.name(), inner)
        }
    }
}

fn render_min_max_sum_count<T>(line: &mut ExportLine, agg: &T, kind: &NumberKind) -> Result<()>
where
    T: MinMaxSumCount,
{
    line.min = Some(number_to_value(&agg.min()?, kind));
    line.max = Some(number_to_value(&agg.max()?, kind));
    line.sum = Some(number_to_value(&agg.sum()?, kind));
    line.count = Some(agg.count()?);
    Ok(())
}

fn number_to_value(number: &Number, kind: &NumberKind) -> serde_json::Value {
    match kind {
        NumberKind::I64 => number.to_i64(kind).into(),
        NumberKind::U64 => number.to_u64(kind).into(),
        NumberKind::F64 => number.to_f64(kind).into(),
    }
}
