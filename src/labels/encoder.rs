use crate::labels::Iter;
use std::fmt;
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

static ENCODER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Encoder is a mechanism for serializing a label set into a canonical string
/// form used for aggregation grouping and export.
///
/// The encoding must be a pure, deterministic function of the (key, value)
/// pairs: equal sets encode identically regardless of the order the pairs were
/// supplied in (the iterator is always key-sorted), and distinct sets must not
/// collide.
pub trait Encoder: fmt::Debug {
    /// Encode returns the serialized encoding of the label set.
    fn encode(&self, labels: &mut Iter<'_>) -> String;

    /// A value that is unique for each class of encoder. Sets cache one
    /// encoding per encoder id.
    fn id(&self) -> EncoderId;
}

/// An identifier for one class of label encoder. Allocate with
/// [`new_encoder_id`]; the zero id is reserved as invalid and is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderId(usize);

impl EncoderId {
    /// Check if the id is valid (non-zero).
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Build a new encoder id, unique for the lifetime of the process.
pub fn new_encoder_id() -> EncoderId {
    EncoderId(ENCODER_ID_COUNTER.fetch_add(1, Ordering::AcqRel))
}

/// The default label encoder: `k1=v1,k2=v2` over the key-sorted pairs.
#[derive(Debug)]
pub struct DefaultLabelEncoder(EncoderId);

impl Default for DefaultLabelEncoder {
    fn default() -> Self {
        DefaultLabelEncoder(new_encoder_id())
    }
}

impl Encoder for DefaultLabelEncoder {
    fn encode(&self, labels: &mut Iter<'_>) -> String {
        labels.enumerate().fold(String::new(), |mut acc, (idx, kv)| {
            if idx > 0 {
                acc.push(',');
            }
            let _ = write!(acc, "{}={}", kv.key, kv.value);
            acc
        })
    }

    fn id(&self) -> EncoderId {
        self.0
    }
}

/// Build a boxed default label encoder.
pub fn default_encoder() -> Box<dyn Encoder + Send + Sync> {
    Box::new(DefaultLabelEncoder::default())
}
