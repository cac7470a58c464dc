//! Common-schema checksum used by the integrity check.

use std::fmt;

/// A checksum computed over a read engine restricted to a subset of schemas.
///
/// Two checksums compare equal only if they were computed over the same
/// schema subset and the underlying data is byte-identical for those
/// schemas. The concrete algorithm lives in `cadence-state` (CRC32 over the
/// schema-sorted, ordinal-sorted record bytes); this type is the opaque
/// result the core compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u32);

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for Checksum {
    fn from(v: u32) -> Self {
        Checksum(v)
    }
}
