//! Label sets and their canonical encodings.
use crate::core::{Key, KeyValue, Value};
use std::cmp;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

const MAX_CONCURRENT_ENCODERS: usize = 3;
type CachedEncoders = [Option<(EncoderId, String)>; MAX_CONCURRENT_ENCODERS];

mod encoder;
pub use encoder::{default_encoder, new_encoder_id, DefaultLabelEncoder, Encoder, EncoderId};

/// Set is the representation for a distinct label set. It manages an immutable
/// set of labels with an internal cache for storing label encodings.
///
/// Two sets built from the same pairs are identical for aggregation purposes
/// regardless of the order the pairs were supplied in: construction sorts by
/// key and drops duplicate keys.
#[derive(Clone, Debug, Default)]
pub struct Set {
    equivalent: Distinct,
    cached_encodings: Arc<Mutex<CachedEncoders>>,
}

impl Set {
    /// The label set length.
    pub fn len(&self) -> usize {
        self.equivalent.len()
    }

    /// Check if the set of labels is empty.
    pub fn is_empty(&self) -> bool {
        self.equivalent.is_empty()
    }

    /// Returns the underlying distinct set of labels for equivalence checks.
    pub fn equivalent(&self) -> &Distinct {
        &self.equivalent
    }

    /// Whether the set supplies a value for the given key.
    pub fn has_key(&self, key: &Key) -> bool {
        self.iter().any(|kv| &kv.key == key)
    }

    /// Iterate over the label key value pairs in key order.
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Encode the label set with the given encoder, caching the result per
    /// encoder id.
    pub fn encoded(&self, encoder: Option<&dyn Encoder>) -> String {
        let encoder = match encoder {
            Some(encoder) if !self.is_empty() => encoder,
            _ => return String::new(),
        };

        let id = encoder.id();
        if !id.is_valid() {
            // Invalid ids are not cached.
            return encoder.encode(&mut self.iter());
        }

        self.cached_encodings
            .lock()
            .map_or(String::new(), |mut encoders| {
                if let Some((_, encoded)) = encoders
                    .iter()
                    .flatten()
                    .find(|(cached_id, _)| *cached_id == id)
                {
                    return encoded.clone();
                }

                let encoded = encoder.encode(&mut self.iter());

                if let Some(slot) = encoders.iter_mut().find(|slot| slot.is_none()) {
                    *slot = Some((id, encoded.clone()));
                }

                encoded
            })
    }
}

impl<T> From<T> for Set
where
    T: AsRef<[KeyValue]>,
{
    fn from(kvs: T) -> Self {
        let kvs = kvs.as_ref();
        if kvs.is_empty() {
            return Set::default();
        }
        let mut inner = kvs.to_vec();
        inner.sort_by(|a, b| a.key.cmp(&b.key));
        inner.dedup_by(|a, b| a.key.eq(&b.key));

        Set {
            equivalent: Distinct(inner),
            cached_encodings: Arc::new(Mutex::new([None, None, None])),
        }
    }
}

impl<'a> IntoIterator for &'a Set {
    type Item = &'a KeyValue;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Iter(self.equivalent.0.iter())
    }
}

/// An iterator over the entries of a `Set`.
#[derive(Debug)]
pub struct Iter<'a>(std::slice::Iter<'a, KeyValue>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a KeyValue;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// Distinct wraps a variable-size array of `KeyValue`, constructed with keys
/// in sorted order. This can be used as a map key or for equality checking
/// between Sets.
#[derive(Clone, Debug, Default)]
pub struct Distinct(Vec<KeyValue>);

impl Distinct {
    /// Check if the labels are empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The length of the set of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Eq for Distinct {}
impl cmp::PartialEq for Distinct {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl Hash for Distinct {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for kv in self.0.iter() {
            kv.key.hash(state);

            match &kv.value {
                Value::Bool(b) => b.hash(state),
                Value::I64(i) => i.hash(state),
                Value::U64(u) => u.hash(state),
                // f64 does not impl Hash; equal floats hash equally via bits.
                Value::F64(f) => f.to_bits().hash(state),
                Value::String(s) => s.hash(state),
            }
        }
    }
}
