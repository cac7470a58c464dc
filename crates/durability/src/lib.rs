//! Blob staging and publication backends for cadence producers.
//!
//! Two implementations of the `BlobStager`/`Publisher`/`BlobRetriever`
//! capability traits from `cadence-core`: a filesystem-backed one for real
//! deployments ([`file`]) and an in-memory one for tests and ephemeral
//! producers ([`memory`]).

#![warn(missing_docs)]

pub mod file;
pub mod memory;

pub use file::{FileBlobRetriever, FileBlobStager, FilePublisher};
pub use memory::{in_memory_blob_store, InMemoryBlobRetriever, InMemoryBlobStager, InMemoryBlobStore, InMemoryPublisher};
