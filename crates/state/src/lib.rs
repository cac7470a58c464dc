//! Reference write/read engine implementation for cadence producers.
//!
//! `cadence-core` defines the [`cadence_core::WriteEngine`] /
//! [`cadence_core::ReadEngine`] contracts abstractly; this crate supplies a
//! concrete, in-memory, ordinal-addressed columnar store that satisfies
//! them, plus the [`ObjectMapper`] seam user domain types cross to become
//! records and the binary codec their snapshots/deltas are encoded with.

#![warn(missing_docs)]

mod codec;
mod engine;
mod field;

pub use codec::Op;
pub use engine::{MemoryReadEngine, MemoryWriteEngine, WriteState};
pub use field::{FieldTuple, FieldValue, ObjectMapper};
