use crate::core::{Key, Unit};
use crate::metrics::{InstrumentKind, NumberKind};

/// Descriptor contains all the settings that describe an instrument, including
/// its name, kind, number kind, and the keys it pre-declares for its label
/// sets. Immutable once created.
///
/// Declared keys do not participate in aggregation grouping; they let an
/// exporter render the keys an instrument intends to use even when a recording
/// site omits one.
#[derive(Clone, Debug, PartialEq, Hash)]
pub struct Descriptor {
    name: String,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    keys: Vec<Key>,
    unit: Option<Unit>,
    description: Option<String>,
}

impl Descriptor {
    /// Create a new descriptor
    pub fn new(name: String, instrument_kind: InstrumentKind, number_kind: NumberKind) -> Self {
        Descriptor {
            name,
            instrument_kind,
            number_kind,
            keys: Vec::new(),
            unit: None,
            description: None,
        }
    }

    /// Assign the label keys this instrument declares up front.
    pub fn with_keys(mut self, keys: Vec<Key>) -> Self {
        self.keys = keys;
        self
    }

    /// Assign the units of the values this instrument records.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Assign a human-readable description.
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The metric instrument's name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The specific kind of instrument.
    pub fn instrument_kind(&self) -> &InstrumentKind {
        &self.instrument_kind
    }

    /// Whether this instrument is declared over `i64`, `f64` or `u64` values.
    pub fn number_kind(&self) -> &NumberKind {
        &self.number_kind
    }

    /// The label keys declared by this instrument, in declaration order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Unit describes the units of the metric instrument.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_ref().map(|unit| unit.as_str())
    }

    /// A human-readable description of the metric instrument.
    pub fn description(&self) -> Option<&String> {
        self.description.as_ref()
    }
}
