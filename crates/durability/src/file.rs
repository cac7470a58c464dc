//! Filesystem blob store: staging, atomic publish, and retrieval.
//!
//! Blobs are staged into a temp file under the store's root and published
//! by an atomic rename, the same temp-file-then-rename pattern used
//! throughout this codebase's other durable writers. A published blob's
//! final name encodes its kind and version range so [`FileBlobRetriever`]
//! can list the directory and reconstruct the chain without a side index.

use cadence_core::{
    Blob, BlobHandle, BlobKind, BlobRetriever, BlobStager, CadenceError, CadenceResult, Publisher,
    StagedBlobWriter, Version,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

fn snapshot_name(to_version: Version) -> String {
    format!("snapshot-{}.bin", to_version.0)
}

fn delta_name(from_version: Version, to_version: Version) -> String {
    format!("delta-{}-{}.bin", from_version.0, to_version.0)
}

fn reverse_delta_name(from_version: Version, to_version: Version) -> String {
    format!("reverse-{}-{}.bin", from_version.0, to_version.0)
}

fn final_path_for(root: &Path, kind: BlobKind, from_version: Version, to_version: Version) -> PathBuf {
    let name = match kind {
        BlobKind::Snapshot => snapshot_name(to_version),
        BlobKind::Delta => delta_name(from_version, to_version),
        BlobKind::ReverseDelta => reverse_delta_name(from_version, to_version),
    };
    root.join(name)
}

/// Stages blobs into temp files under `root`.
///
/// The blob returned by [`StagedBlobWriter::finish`] still points at the
/// temp file — only [`FilePublisher::publish`] performs the atomic rename
/// to the final, retrievable name.
pub struct FileBlobStager {
    root: PathBuf,
}

impl FileBlobStager {
    /// Create a stager rooted at `root`, creating the directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> CadenceResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        Ok(FileBlobStager { root })
    }

    fn open(
        &self,
        kind: BlobKind,
        from_version: Version,
        to_version: Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        let final_path = final_path_for(&self.root, kind, from_version, to_version);
        let temp_path = final_path.with_extension("tmp");
        if temp_path.exists() {
            warn!(path = %temp_path.display(), "removing stale staging temp file");
            let _ = std::fs::remove_file(&temp_path);
        }
        let file = File::create(&temp_path).map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        Ok(Box::new(FileStagingWriter {
            file,
            temp_path,
            kind,
            from_version,
            to_version,
        }))
    }
}

impl BlobStager for FileBlobStager {
    fn open_snapshot(&self, to_version: Version) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::Snapshot, Version::SENTINEL, to_version)
    }

    fn open_delta(&self, from_version: Version, to_version: Version) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::Delta, from_version, to_version)
    }

    fn open_reverse_delta(
        &self,
        from_version: Version,
        to_version: Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::ReverseDelta, from_version, to_version)
    }
}

struct FileStagingWriter {
    file: File,
    temp_path: PathBuf,
    kind: BlobKind,
    from_version: Version,
    to_version: Version,
}

impl Write for FileStagingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl StagedBlobWriter for FileStagingWriter {
    fn finish(mut self: Box<Self>) -> CadenceResult<Blob> {
        self.file.sync_all().map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        debug!(path = %self.temp_path.display(), kind = %self.kind, "staged blob ready for publish");
        Ok(Blob {
            kind: self.kind,
            from_version: self.from_version,
            to_version: self.to_version,
            handle: BlobHandle::Path(self.temp_path),
        })
    }
}

/// Publishes staged blobs by renaming them into their final, retrievable
/// names under `root`. The rename is atomic on POSIX filesystems; if it
/// fails the staged temp file is left in place rather than deleted, so
/// nothing is silently lost.
pub struct FilePublisher {
    root: PathBuf,
}

impl FilePublisher {
    /// Create a publisher rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilePublisher { root: root.into() }
    }
}

impl Publisher for FilePublisher {
    fn publish(&self, blob: &Blob) -> CadenceResult<()> {
        let BlobHandle::Path(temp_path) = &blob.handle else {
            return Err(CadenceError::PublisherIo(
                "FilePublisher requires a path-backed blob handle".into(),
            ));
        };
        let final_path = final_path_for(&self.root, blob.kind, blob.from_version, blob.to_version);
        std::fs::rename(temp_path, &final_path).map_err(|e| {
            warn!(temp = %temp_path.display(), error = %e, "rename to final blob path failed");
            CadenceError::PublisherIo(e.to_string())
        })?;
        debug!(path = %final_path.display(), "published blob");
        Ok(())
    }
}

/// Retrieves published blobs from a directory laid out by [`FilePublisher`].
///
/// Keeps a cached latest-snapshot version behind a `RwLock` so repeated
/// restore-time lookups don't re-scan the directory; [`FileBlobRetriever::refresh`]
/// invalidates the cache after new publishes.
pub struct FileBlobRetriever {
    root: PathBuf,
    cached_latest_snapshot: RwLock<Option<Version>>,
}

impl FileBlobRetriever {
    /// Create a retriever rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileBlobRetriever {
            root: root.into(),
            cached_latest_snapshot: RwLock::new(None),
        }
    }

    /// Drop the cached latest-snapshot version, forcing the next lookup to
    /// re-scan the directory.
    pub fn refresh(&self) {
        *self.cached_latest_snapshot.write().unwrap() = None;
    }

    fn scan_latest_snapshot(&self) -> CadenceResult<Option<Version>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CadenceError::PublisherIo(e.to_string())),
        };
        let mut best: Option<i64> = None;
        for entry in entries {
            let entry = entry.map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("snapshot-").and_then(|s| s.strip_suffix(".bin")) {
                if let Ok(v) = rest.parse::<i64>() {
                    best = Some(best.map_or(v, |b| b.max(v)));
                }
            }
        }
        Ok(best.map(Version))
    }

    fn read_blob(&self, path: PathBuf, kind: BlobKind, from_version: Version, to_version: Version) -> Blob {
        Blob {
            kind,
            from_version,
            to_version,
            handle: BlobHandle::Path(path),
        }
    }
}

impl BlobRetriever for FileBlobRetriever {
    fn latest_snapshot_version(&self) -> CadenceResult<Option<Version>> {
        if let Some(cached) = *self.cached_latest_snapshot.read().unwrap() {
            return Ok(Some(cached));
        }
        let found = self.scan_latest_snapshot()?;
        if let Some(version) = found {
            *self.cached_latest_snapshot.write().unwrap() = Some(version);
        }
        Ok(found)
    }

    fn snapshot(&self, version: Version) -> CadenceResult<Blob> {
        let path = self.root.join(snapshot_name(version));
        if !path.exists() {
            return Err(CadenceError::PublisherIo(format!(
                "no snapshot blob for version {version}"
            )));
        }
        Ok(self.read_blob(path, BlobKind::Snapshot, Version::SENTINEL, version))
    }

    fn delta_after(&self, version: Version) -> CadenceResult<Option<Blob>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("delta-").and_then(|s| s.strip_suffix(".bin")) {
                if let Some((from_str, to_str)) = rest.split_once('-') {
                    if let (Ok(from), Ok(to)) = (from_str.parse::<i64>(), to_str.parse::<i64>()) {
                        if from == version.0 {
                            return Ok(Some(self.read_blob(
                                entry.path(),
                                BlobKind::Delta,
                                Version(from),
                                Version(to),
                            )));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}
