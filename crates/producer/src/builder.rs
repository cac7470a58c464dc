//! `ProducerBuilder`: the one recognized construction surface for a
//! [`Producer`](crate::cycle::Producer).
//!
//! Mirrors the staged-options-then-`build()` builders elsewhere in this
//! codebase: every option has a sensible default except `publisher` and
//! `announcer`, which are mandatory, and `blob_stager`/`blob_compressor` are
//! mutually exclusive ways of getting to the same place.

use crate::cycle::Producer;
use crate::executor::InlineExecutor;
use crate::read_state_holder::ReadStateHolder;
use crate::validator::ValidatorRunner;
use crate::version_minter::MonotonicVersionMinter;
use crate::{ListenerBroadcaster, SnapshotPublishExecutor};
use cadence_core::{
    Announcer, Blob, BlobCompressor, BlobHandle, BlobKind, BlobRetriever, BlobStager, CadenceError,
    CadenceResult, Publisher, ReadEngine, RestoreInto, StagedBlobWriter, Validator, VersionMinter, WriteEngine,
};
use cadence_durability::FileBlobStager;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEFAULT_TARGET_MAX_TYPE_SHARD_SIZE_BYTES: u64 = 16 * 1024 * 1024;

/// Builds a [`Producer`] from its injected collaborators.
pub struct ProducerBuilder<W, R>
where
    W: WriteEngine + RestoreInto<R>,
    R: ReadEngine,
{
    write_engine: Option<W>,
    publisher: Option<Arc<dyn Publisher>>,
    announcer: Option<Arc<dyn Announcer>>,
    validators: Vec<Arc<dyn Validator<R>>>,
    listeners: Vec<Arc<dyn cadence_core::Listener>>,
    blob_stager: Option<Arc<dyn BlobStager>>,
    blob_compressor: Option<Arc<dyn BlobCompressor>>,
    blob_staging_dir: Option<PathBuf>,
    version_minter: Option<Arc<dyn VersionMinter>>,
    snapshot_publish_executor: Option<Arc<dyn SnapshotPublishExecutor>>,
    num_states_between_snapshots: i64,
    target_max_type_shard_size_bytes: u64,
}

impl<W, R> ProducerBuilder<W, R>
where
    W: WriteEngine + RestoreInto<R>,
    R: ReadEngine,
{
    /// Start a builder with a caller-supplied, freshly constructed write
    /// engine and otherwise all-default options.
    pub fn new(write_engine: W) -> Self {
        ProducerBuilder {
            write_engine: Some(write_engine),
            publisher: None,
            announcer: None,
            validators: Vec::new(),
            listeners: Vec::new(),
            blob_stager: None,
            blob_compressor: None,
            blob_staging_dir: None,
            version_minter: None,
            snapshot_publish_executor: None,
            num_states_between_snapshots: 0,
            target_max_type_shard_size_bytes: DEFAULT_TARGET_MAX_TYPE_SHARD_SIZE_BYTES,
        }
    }

    /// The publisher used to persist every staged blob. Required.
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The announcer used to signal a new version is live. Required.
    pub fn announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = Some(announcer);
        self
    }

    /// Register one validator. May be called any number of times.
    pub fn validator(mut self, validator: Arc<dyn Validator<R>>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Register one listener. May be called any number of times.
    pub fn listener(mut self, listener: Arc<dyn cadence_core::Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Supply a fully custom blob stager. Mutually exclusive with
    /// [`blob_compressor`](Self::blob_compressor)/[`blob_staging_dir`](Self::blob_staging_dir).
    pub fn blob_stager(mut self, stager: Arc<dyn BlobStager>) -> Self {
        self.blob_stager = Some(stager);
        self
    }

    /// Use the reference filesystem stager rooted at `dir`, optionally
    /// wrapped with [`blob_compressor`](Self::blob_compressor). Mutually
    /// exclusive with [`blob_stager`](Self::blob_stager).
    pub fn blob_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_staging_dir = Some(dir.into());
        self
    }

    /// Wrap the filesystem stager's streams with a compressor. Only takes
    /// effect alongside [`blob_staging_dir`](Self::blob_staging_dir).
    pub fn blob_compressor(mut self, compressor: Arc<dyn BlobCompressor>) -> Self {
        self.blob_compressor = Some(compressor);
        self
    }

    /// Override the default wall-clock-seeded monotonic version minter.
    pub fn version_minter(mut self, minter: Arc<dyn VersionMinter>) -> Self {
        self.version_minter = Some(minter);
        self
    }

    /// Override the default inline (synchronous) snapshot publish executor.
    pub fn snapshot_publish_executor(mut self, executor: Arc<dyn SnapshotPublishExecutor>) -> Self {
        self.snapshot_publish_executor = Some(executor);
        self
    }

    /// How many cycles to defer snapshot publication for. `0` (the default)
    /// publishes the snapshot synchronously every cycle.
    pub fn num_states_between_snapshots(mut self, n: i64) -> Self {
        self.num_states_between_snapshots = n;
        self
    }

    /// Sizing hint forwarded to the write engine; not enforced by the
    /// reference engine.
    pub fn target_max_type_shard_size_bytes(mut self, bytes: u64) -> Self {
        self.target_max_type_shard_size_bytes = bytes;
        self
    }

    /// Validate the accumulated options and construct the producer.
    pub fn build(mut self) -> CadenceResult<Producer<W, R>> {
        let write_engine = self
            .write_engine
            .take()
            .ok_or_else(|| CadenceError::InvalidConfiguration("write engine is required".into()))?;
        let publisher = self
            .publisher
            .take()
            .ok_or_else(|| CadenceError::InvalidConfiguration("publisher is required".into()))?;
        let announcer = self
            .announcer
            .take()
            .ok_or_else(|| CadenceError::InvalidConfiguration("announcer is required".into()))?;

        let blob_stager = match (&self.blob_stager, &self.blob_staging_dir, &self.blob_compressor) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(CadenceError::InvalidConfiguration(
                    "blob_stager is mutually exclusive with blob_staging_dir/blob_compressor".into(),
                ))
            }
            (Some(stager), None, None) => stager.clone(),
            (None, Some(dir), Some(compressor)) => {
                std::fs::create_dir_all(dir).map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
                Arc::new(CompressingBlobStager::new(dir.clone(), compressor.clone())) as Arc<dyn BlobStager>
            }
            (None, Some(dir), None) => Arc::new(FileBlobStager::new(dir.clone())?) as Arc<dyn BlobStager>,
            (None, None, _) => {
                return Err(CadenceError::InvalidConfiguration(
                    "either blob_stager or blob_staging_dir must be supplied".into(),
                ))
            }
        };

        let version_minter = self
            .version_minter
            .take()
            .unwrap_or_else(|| Arc::new(MonotonicVersionMinter::new()));
        let snapshot_publish_executor = self
            .snapshot_publish_executor
            .take()
            .unwrap_or_else(|| Arc::new(InlineExecutor));

        let listeners = Arc::new(ListenerBroadcaster::new(self.listeners));
        listeners.producer_init();
        info!(
            target: "cadence::builder",
            num_states_between_snapshots = self.num_states_between_snapshots,
            "producer constructed"
        );

        Ok(Producer {
            write_engine,
            read_state_holder: ReadStateHolder::new(),
            version_minter,
            blob_stager,
            publisher,
            announcer,
            validators: ValidatorRunner::new(self.validators),
            listeners,
            snapshot_publish_executor,
            num_states_between_snapshots: self.num_states_between_snapshots,
            num_states_until_next_snapshot: self.num_states_between_snapshots,
            target_max_type_shard_size_bytes: self.target_max_type_shard_size_bytes,
            last_minted: None,
        })
    }
}

/// Wraps [`FileBlobStager`]'s temp-file-then-rename staging with a
/// compressor, writing compressed bytes straight through instead of
/// buffering the whole blob first.
struct CompressingBlobStager {
    root: PathBuf,
    compressor: Arc<dyn BlobCompressor>,
}

impl CompressingBlobStager {
    fn new(root: PathBuf, compressor: Arc<dyn BlobCompressor>) -> Self {
        CompressingBlobStager { root, compressor }
    }

    fn open(
        &self,
        kind: BlobKind,
        from_version: cadence_core::Version,
        to_version: cadence_core::Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        let name = match kind {
            BlobKind::Snapshot => format!("snapshot-{}.bin", to_version.0),
            BlobKind::Delta => format!("delta-{}-{}.bin", from_version.0, to_version.0),
            BlobKind::ReverseDelta => format!("reverse-{}-{}.bin", from_version.0, to_version.0),
        };
        let temp_path = self.root.join(name).with_extension("tmp");
        let file = File::create(&temp_path).map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        let sink = self.compressor.compress(Box::new(file));
        Ok(Box::new(CompressingStagingWriter {
            sink,
            temp_path,
            kind,
            from_version,
            to_version,
        }))
    }
}

impl BlobStager for CompressingBlobStager {
    fn open_snapshot(&self, to_version: cadence_core::Version) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::Snapshot, cadence_core::Version::SENTINEL, to_version)
    }

    fn open_delta(
        &self,
        from_version: cadence_core::Version,
        to_version: cadence_core::Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::Delta, from_version, to_version)
    }

    fn open_reverse_delta(
        &self,
        from_version: cadence_core::Version,
        to_version: cadence_core::Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>> {
        self.open(BlobKind::ReverseDelta, from_version, to_version)
    }
}

struct CompressingStagingWriter {
    sink: Box<dyn Write + Send>,
    temp_path: PathBuf,
    kind: BlobKind,
    from_version: cadence_core::Version,
    to_version: cadence_core::Version,
}

impl Write for CompressingStagingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.sink.flush()
    }
}

impl StagedBlobWriter for CompressingStagingWriter {
    fn finish(mut self: Box<Self>) -> CadenceResult<Blob> {
        self.sink.flush().map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        drop(self.sink);
        Ok(Blob {
            kind: self.kind,
            from_version: self.from_version,
            to_version: self.to_version,
            handle: BlobHandle::Path(self.temp_path),
        })
    }
}

/// Decorates a [`BlobRetriever`] so every fetched blob's bytes are
/// eagerly decompressed into memory, mirroring the compressor applied at
/// staging time by [`CompressingBlobStager`].
pub struct CompressingBlobRetriever {
    inner: Arc<dyn BlobRetriever>,
    compressor: Arc<dyn BlobCompressor>,
}

impl CompressingBlobRetriever {
    /// Wrap `inner` so every returned blob is decompressed through `compressor`.
    pub fn new(inner: Arc<dyn BlobRetriever>, compressor: Arc<dyn BlobCompressor>) -> Self {
        CompressingBlobRetriever { inner, compressor }
    }

    fn decompress(&self, blob: Blob) -> CadenceResult<Blob> {
        let reader = blob.reader()?;
        let mut decompressed = self.compressor.decompress(reader);
        let mut bytes = Vec::new();
        decompressed
            .read_to_end(&mut bytes)
            .map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
        Ok(Blob {
            kind: blob.kind,
            from_version: blob.from_version,
            to_version: blob.to_version,
            handle: BlobHandle::Memory(Arc::new(bytes)),
        })
    }
}

impl BlobRetriever for CompressingBlobRetriever {
    fn latest_snapshot_version(&self) -> CadenceResult<Option<cadence_core::Version>> {
        self.inner.latest_snapshot_version()
    }

    fn snapshot(&self, version: cadence_core::Version) -> CadenceResult<Blob> {
        self.decompress(self.inner.snapshot(version)?)
    }

    fn delta_after(&self, version: cadence_core::Version) -> CadenceResult<Option<Blob>> {
        match self.inner.delta_after(version)? {
            Some(blob) => Ok(Some(self.decompress(blob)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{IdentityCompressor, Version};
    use cadence_durability::in_memory_blob_store;
    use cadence_state::{MemoryReadEngine, MemoryWriteEngine};

    struct RecordingAnnouncer;
    impl Announcer for RecordingAnnouncer {
        fn announce(&self, _version: Version) -> CadenceResult<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_publisher_is_invalid_configuration() {
        let (_store, stager, _publisher, _retriever) = in_memory_blob_store();
        let result: CadenceResult<Producer<MemoryWriteEngine, MemoryReadEngine>> =
            ProducerBuilder::new(MemoryWriteEngine::new())
                .announcer(Arc::new(RecordingAnnouncer))
                .blob_stager(Arc::new(stager))
                .build();
        assert!(matches!(result, Err(CadenceError::InvalidConfiguration(_))));
    }

    #[test]
    fn blob_stager_and_blob_staging_dir_together_is_invalid() {
        let (_store, stager, publisher, _retriever) = in_memory_blob_store();
        let dir = tempfile::tempdir().unwrap();
        let result: CadenceResult<Producer<MemoryWriteEngine, MemoryReadEngine>> =
            ProducerBuilder::new(MemoryWriteEngine::new())
                .publisher(Arc::new(publisher))
                .announcer(Arc::new(RecordingAnnouncer))
                .blob_stager(Arc::new(stager))
                .blob_staging_dir(dir.path())
                .build();
        assert!(matches!(result, Err(CadenceError::InvalidConfiguration(_))));
    }

    #[test]
    fn neither_blob_stager_nor_blob_staging_dir_is_invalid() {
        let (_store, _stager, publisher, _retriever) = in_memory_blob_store();
        let result: CadenceResult<Producer<MemoryWriteEngine, MemoryReadEngine>> =
            ProducerBuilder::new(MemoryWriteEngine::new())
                .publisher(Arc::new(publisher))
                .announcer(Arc::new(RecordingAnnouncer))
                .build();
        assert!(matches!(result, Err(CadenceError::InvalidConfiguration(_))));
    }

    #[test]
    fn minimal_valid_configuration_builds() {
        let (_store, stager, publisher, _retriever) = in_memory_blob_store();
        let producer: Producer<MemoryWriteEngine, MemoryReadEngine> = ProducerBuilder::new(MemoryWriteEngine::new())
            .publisher(Arc::new(publisher))
            .announcer(Arc::new(RecordingAnnouncer))
            .blob_stager(Arc::new(stager))
            .build()
            .unwrap();
        assert!(producer.current().is_none());
        assert_eq!(producer.target_max_type_shard_size_bytes(), DEFAULT_TARGET_MAX_TYPE_SHARD_SIZE_BYTES);
    }

    #[test]
    fn blob_staging_dir_with_compressor_round_trips_through_compressing_retriever() {
        let dir = tempfile::tempdir().unwrap();
        let compressor: Arc<dyn BlobCompressor> = Arc::new(IdentityCompressor);
        let compressing_stager = CompressingBlobStager::new(dir.path().to_path_buf(), compressor.clone());

        let mut writer = compressing_stager.open_snapshot(Version(1)).unwrap();
        writer.write_all(b"hello").unwrap();
        let blob = writer.finish().unwrap();

        let publisher = cadence_durability::FilePublisher::new(dir.path());
        publisher.publish(&blob).unwrap();

        let file_retriever = Arc::new(cadence_durability::FileBlobRetriever::new(dir.path()));
        let retriever = CompressingBlobRetriever::new(file_retriever, compressor);
        let fetched = retriever.snapshot(Version(1)).unwrap();
        let mut contents = Vec::new();
        fetched.reader().unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello");
    }
}
