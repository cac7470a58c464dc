//! Core types and capability traits for the cadence producer cycle engine.
//!
//! This crate defines the data model this engine is built on: versions, blobs, read states, and the narrow
//! capability traits a producer is built from (version minting, blob
//! staging, publication, announcement, validation, and lifecycle
//! listening). It has no opinion on how a dataset is actually stored —
//! that lives in `cadence-state` — and no opinion on where blobs are
//! durably kept — that lives in `cadence-durability`.

#![warn(missing_docs)]

pub mod blob;
pub mod capability;
pub mod checksum;
pub mod error;
pub mod read_state;
pub mod status;
pub mod version;

pub use blob::{Blob, BlobHandle, BlobKind, StagedBlobWriter};
pub use capability::{
    Announcer, BlobCompressor, BlobRetriever, BlobStager, IdentityCompressor, Listener, Publisher, ReadEngine,
    RestoreInto, Validator, VersionMinter, WriteEngine,
};
pub use checksum::Checksum;
pub use error::{CadenceError, CadenceResult};
pub use read_state::ReadState;
pub use status::{CycleOutcome, CycleStatus, PhaseTiming, RestoreStatus};
pub use version::Version;
