//! Blob artifacts: snapshot, delta, and reverse-delta.

use crate::error::CadenceResult;
use crate::version::Version;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// The kind of a staged or published blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    /// Full serialized dataset at a version. `from_version` is the sentinel.
    Snapshot,
    /// Forward edit script from `from_version` to `to_version`.
    Delta,
    /// Backward edit script from `to_version` to `from_version`.
    ReverseDelta,
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlobKind::Snapshot => "snapshot",
            BlobKind::Delta => "delta",
            BlobKind::ReverseDelta => "reverse-delta",
        };
        write!(f, "{s}")
    }
}

/// Where a blob's bytes live once staged.
///
/// Staging backends (`cadence-durability`) hand back a handle instead of
/// raw bytes so the integrity check, publisher, and restore path can each
/// open their own independent reader without re-staging.
#[derive(Clone)]
pub enum BlobHandle {
    /// Bytes live at a filesystem path (the common case for a real deployment).
    Path(PathBuf),
    /// Bytes live in memory (used by tests and by ephemeral producers).
    Memory(Arc<Vec<u8>>),
}

impl BlobHandle {
    /// Open an independent reader over this blob's bytes.
    pub fn reader(&self) -> CadenceResult<Box<dyn Read + Send>> {
        match self {
            BlobHandle::Path(path) => {
                let file = std::fs::File::open(path)
                    .map_err(|e| crate::error::CadenceError::PublisherIo(e.to_string()))?;
                Ok(Box::new(file))
            }
            BlobHandle::Memory(bytes) => Ok(Box::new(std::io::Cursor::new(Arc::clone(bytes)))),
        }
    }
}

// `Cursor<Arc<Vec<u8>>>` needs `Arc<Vec<u8>>: AsRef<[u8]>`, which the stdlib
// provides, so no manual impl is needed here; kept as a doc note for readers
// wondering how a shared buffer becomes a `Read`.

/// A staged or published artifact: a snapshot, delta, or reverse-delta
/// tagged with the version range it covers.
#[derive(Clone)]
pub struct Blob {
    /// Which kind of artifact this is.
    pub kind: BlobKind,
    /// Source version (sentinel for snapshots).
    pub from_version: Version,
    /// Destination version.
    pub to_version: Version,
    /// Where the bytes can be read back from.
    pub handle: BlobHandle,
}

impl Blob {
    /// Open a reader over this blob's bytes.
    pub fn reader(&self) -> CadenceResult<Box<dyn Read + Send>> {
        self.handle.reader()
    }
}

/// A writable, in-progress blob returned by a [`BlobStager`](crate::capability::BlobStager).
///
/// Callers write serialized bytes to it via the `Write` impl, then call
/// [`finish`](StagedBlobWriter::finish) to publish metadata and obtain the
/// finished [`Blob`].
pub trait StagedBlobWriter: Write + Send {
    /// Finalize the write (flush, close, rename into place) and return the
    /// staged blob's metadata and handle.
    fn finish(self: Box<Self>) -> CadenceResult<Blob>;
}
