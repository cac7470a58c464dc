//! Narrow capability traits injected into a producer.
//!
//! Each trait here corresponds to one row of the "Injected capabilities"
//! table: a single, small contract the core drives without knowing how it's
//! implemented. `cadence-state` supplies the reference `WriteEngine`/
//! `ReadEngine`; `cadence-durability` supplies the reference
//! `BlobStager`/`Publisher`/`BlobRetriever`. Users of the crate supply their
//! own `Announcer`, `Validator`s, and `Listener`s.

use crate::blob::{Blob, BlobKind, StagedBlobWriter};
use crate::checksum::Checksum;
use crate::error::CadenceResult;
use crate::read_state::ReadState;
use crate::status::{CycleStatus, RestoreStatus};
use crate::version::Version;
use std::io::{Read, Write};
use std::time::Duration;

/// Mutable staging area for the next version.
///
/// Implementations track their own dirty bit so
/// [`has_changed_since_last_cycle`](WriteEngine::has_changed_since_last_cycle)
/// can answer without a full diff. `cadence-state::MemoryWriteEngine` is the
/// reference implementation; user populators mutate it through
/// `cadence_state::WriteState`, not through this trait directly — this
/// trait is the surface the cycle engine drives.
pub trait WriteEngine: Send {
    /// Roll the dirty bit and any per-cycle bookkeeping forward, keeping
    /// the underlying data untouched. Called once at the start of a cycle,
    /// before the populator runs.
    fn prepare_for_next_cycle(&mut self);

    /// True if any record was added or removed since the last
    /// `prepare_for_next_cycle`.
    fn has_changed_since_last_cycle(&self) -> bool;

    /// Discard edits made since the last `prepare_for_next_cycle`, restoring
    /// the engine to the state it was in right after that call. Used both
    /// for the no-delta path and for rollback on failure.
    fn reset_to_last_prepare(&mut self);

    /// Serialize the full current state as a snapshot.
    fn write_snapshot(&self, out: &mut dyn Write) -> CadenceResult<()>;

    /// Serialize a forward edit script from the last-published state to the
    /// current state.
    fn write_delta(&self, out: &mut dyn Write) -> CadenceResult<()>;

    /// Serialize a backward edit script from the current state to the
    /// last-published state.
    fn write_reverse_delta(&self, out: &mut dyn Write) -> CadenceResult<()>;
}

/// Immutable materialization of one published version.
pub trait ReadEngine: Default + Clone + Send + Sync + 'static {
    /// Load a full snapshot, replacing any existing content.
    fn load_snapshot(&mut self, input: &mut dyn Read) -> CadenceResult<()>;

    /// Apply a forward (or, symmetrically, a reverse) delta in place.
    fn apply_delta(&mut self, input: &mut dyn Read) -> CadenceResult<()>;

    /// Compute a checksum over the given schema subset only. Schemas absent
    /// from this engine are skipped, not treated as zero — callers restrict
    /// to the intersection of both sides' schemas before comparing.
    fn checksum(&self, schemas: &[String]) -> Checksum;

    /// Names of every schema currently present.
    fn schema_names(&self) -> Vec<String>;
}

/// Ties a [`WriteEngine`] to the concrete [`ReadEngine`] it can rehydrate
/// record-id continuity from, during a restore.
pub trait RestoreInto<R: ReadEngine>: WriteEngine {
    /// Seed this (freshly constructed) write engine's identity/ordinal
    /// allocation from an already-materialized read engine.
    fn restore_from(&mut self, read_engine: &R) -> CadenceResult<()>;
}

/// Produces a writable blob for a given kind and version range.
pub trait BlobStager: Send + Sync {
    /// Open a writable snapshot blob for `to_version`.
    fn open_snapshot(&self, to_version: Version) -> CadenceResult<Box<dyn StagedBlobWriter>>;

    /// Open a writable forward-delta blob from `from_version` to `to_version`.
    fn open_delta(
        &self,
        from_version: Version,
        to_version: Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>>;

    /// Open a writable reverse-delta blob from `to_version` back to `from_version`.
    fn open_reverse_delta(
        &self,
        from_version: Version,
        to_version: Version,
    ) -> CadenceResult<Box<dyn StagedBlobWriter>>;
}

/// Persists a staged blob to the durable blob store.
pub trait Publisher: Send + Sync {
    /// Publish a staged blob. Called synchronously for DELTA/REVERSE_DELTA,
    /// and either synchronously or on the snapshot executor for SNAPSHOT.
    fn publish(&self, blob: &Blob) -> CadenceResult<()>;
}

/// Publishes the new version id so consumers refresh.
pub trait Announcer: Send + Sync {
    /// Announce that `version` is now the latest published version.
    fn announce(&self, version: Version) -> CadenceResult<()>;
}

/// Produces a strictly ascending version per cycle.
pub trait VersionMinter: Send + Sync {
    /// Mint the next version. Every call must return a value strictly
    /// greater than every value this minter has ever returned.
    fn mint(&self) -> Version;
}

/// Wraps staging streams with compression; identity by default.
pub trait BlobCompressor: Send + Sync {
    /// Wrap a writer so bytes written to it are compressed before hitting `out`.
    fn compress(&self, out: Box<dyn Write + Send>) -> Box<dyn Write + Send>;

    /// Wrap a reader so bytes read from it are decompressed from `input`.
    fn decompress(&self, input: Box<dyn Read + Send>) -> Box<dyn Read + Send>;
}

/// Identity compressor: passes bytes through unchanged.
pub struct IdentityCompressor;

impl BlobCompressor for IdentityCompressor {
    fn compress(&self, out: Box<dyn Write + Send>) -> Box<dyn Write + Send> {
        out
    }

    fn decompress(&self, input: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
        input
    }
}

/// Fetches a prior blob chain for restore.
pub trait BlobRetriever: Send + Sync {
    /// The most recent version a snapshot was staged for, if any.
    fn latest_snapshot_version(&self) -> CadenceResult<Option<Version>>;

    /// Fetch the snapshot blob for an exact version.
    fn snapshot(&self, version: Version) -> CadenceResult<Blob>;

    /// Fetch the delta blob whose `from_version` is `version`, if one was
    /// published. Used to walk forward from a snapshot to the desired
    /// version one delta at a time.
    fn delta_after(&self, version: Version) -> CadenceResult<Option<Blob>>;
}

/// Validates the pending read state before it is announced.
pub trait Validator<R: ReadEngine>: Send + Sync {
    /// Inspect `state` and return an error describing why it is invalid.
    fn validate(&self, state: &ReadState<R>) -> CadenceResult<()>;

    /// A short name used in `ValidationFailed` failure messages.
    fn name(&self) -> &str {
        "validator"
    }
}

/// Lifecycle callbacks fanned out to every registered listener.
///
/// Every method has a no-op default so a listener only needs to implement
/// the events it cares about. A listener that panics or returns an error
/// from a fallible hook is swallowed and logged by the broadcaster — see
/// `cadence_producer::listener::ListenerBroadcaster`.
pub trait Listener: Send + Sync {
    /// Fired once when a producer is constructed.
    fn on_producer_init(&self) {}
    /// Start of a cycle, carrying the freshly minted `to_version`.
    fn on_cycle_start(&self, _to_version: Version) {}
    /// Fired instead of `on_cycle_start`'s usual follow-up when there is no
    /// current read state yet — this is the first delta chain link.
    fn on_new_delta_chain(&self, _to_version: Version) {}
    /// Start of the populate phase.
    fn on_populate_start(&self, _to_version: Version) {}
    /// End of the populate phase.
    fn on_populate_complete(&self, _to_version: Version, _duration: Duration, _result: &CadenceResult<()>) {}
    /// Fired when the populator ran but the write engine reported no change.
    fn on_no_delta(&self, _to_version: Version) {}
    /// Start of the publish phase (covers all staged blobs for this cycle).
    fn on_publish_start(&self, _to_version: Version) {}
    /// One blob finished staging and publishing.
    fn on_artifact_publish(
        &self,
        _kind: BlobKind,
        _to_version: Version,
        _duration: Duration,
        _result: &CadenceResult<()>,
    ) {
    }
    /// End of the publish phase.
    fn on_publish_complete(&self, _to_version: Version, _duration: Duration) {}
    /// Start of the integrity check.
    fn on_integrity_start(&self, _to_version: Version) {}
    /// End of the integrity check.
    fn on_integrity_complete(&self, _to_version: Version, _duration: Duration, _result: &CadenceResult<()>) {}
    /// Start of validation.
    fn on_validation_start(&self, _to_version: Version) {}
    /// End of validation.
    fn on_validation_complete(&self, _to_version: Version, _duration: Duration, _result: &CadenceResult<()>) {}
    /// Start of announcement.
    fn on_announcement_start(&self, _to_version: Version) {}
    /// End of announcement.
    fn on_announcement_complete(&self, _to_version: Version, _duration: Duration, _result: &CadenceResult<()>) {}
    /// Start of a restore.
    fn on_restore_start(&self, _desired: Version) {}
    /// End of a restore.
    fn on_restore_complete(&self, _status: &RestoreStatus) {}
    /// End of a cycle, regardless of outcome.
    fn on_cycle_complete(&self, _status: &CycleStatus) {}
}
