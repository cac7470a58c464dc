//! Field-level value representation and the object-to-record mapping.
//!
//! The object-to-record mapping and schema derivation is an
//! external collaborator. [`ObjectMapper`] is the narrow seam a user's
//! domain type crosses to become a record: it names its schema and
//! flattens itself into an ordered [`FieldValue`] tuple. Two records with
//! equal field tuples are the same record for the purposes of value-equality
//! dedup, supporting value-equality queries without object allocation.

use serde::{Deserialize, Serialize};

/// One field of a flattened record.
///
/// `Reference` holds the ordinal of a record in another (or the same)
/// schema's shard — this is how cross-record references survive the
/// round-trip through snapshot/delta encoding without pointers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    /// A signed integer field.
    Int(i64),
    /// A floating-point field, stored as its bit pattern so `FieldValue`
    /// can implement `Eq`/`Hash` for dedup indexing.
    Float(u64),
    /// A boolean field.
    Bool(bool),
    /// A UTF-8 string field.
    Str(String),
    /// An opaque byte-string field.
    Bytes(Vec<u8>),
    /// A reference to the ordinal of a record in another schema's shard.
    Reference(usize),
    /// An absent value.
    Null,
}

impl FieldValue {
    /// Build a `Float` field from an `f64`.
    pub fn from_f64(v: f64) -> Self {
        FieldValue::Float(v.to_bits())
    }

    /// Recover the `f64` from a `Float` field, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

/// A key used to deduplicate records by value equality.
pub type FieldTuple = Vec<FieldValue>;

/// Maps a user domain type onto a schema name and a flattened field tuple.
///
/// This is the object-to-record mapping, an external
/// collaborator. Implement it for every domain type that should be
/// populated into a [`crate::engine::WriteState`].
///
/// ```
/// use cadence_state::{FieldValue, ObjectMapper};
///
/// struct Movie {
///     title: String,
///     year: i64,
/// }
///
/// impl ObjectMapper for Movie {
///     fn schema_name(&self) -> &'static str {
///         "Movie"
///     }
///
///     fn to_fields(&self) -> Vec<FieldValue> {
///         vec![FieldValue::Str(self.title.clone()), FieldValue::Int(self.year)]
///     }
/// }
/// ```
pub trait ObjectMapper {
    /// The schema this type's records belong to.
    fn schema_name(&self) -> &'static str;

    /// Flatten this record into its field tuple.
    fn to_fields(&self) -> Vec<FieldValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_round_trips_through_bits() {
        let f = FieldValue::from_f64(3.25);
        assert_eq!(f.as_f64(), Some(3.25));
    }

    #[test]
    fn field_values_are_hashable_for_dedup_index() {
        use std::collections::HashMap;
        let mut index: HashMap<FieldTuple, usize> = HashMap::new();
        index.insert(vec![FieldValue::Int(1), FieldValue::Str("a".into())], 0);
        assert_eq!(
            index.get(&vec![FieldValue::Int(1), FieldValue::Str("a".into())]),
            Some(&0)
        );
    }
}
