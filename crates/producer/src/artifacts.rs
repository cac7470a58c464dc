//! The cycle's up-to-three staged blobs, and the cleanup/deferred-publish
//! coordination around them.

use cadence_core::{Blob, BlobKind};
use parking_lot::Mutex;

#[derive(Default)]
struct ArtifactsState {
    delta: Option<Blob>,
    reverse_delta: Option<Blob>,
    snapshot: Option<Blob>,
    cleanup_requested: bool,
    snapshot_publish_complete: bool,
}

/// Holds this cycle's blobs and serializes cleanup against deferred
/// snapshot publication.
///
/// DELTA and REVERSE_DELTA are released as soon as [`Artifacts::cleanup`] is
/// called. SNAPSHOT is released only once both `cleanup` has been called
/// *and* [`Artifacts::mark_snapshot_publish_complete`] has fired — whichever
/// happens second actually drops the handle, since an async snapshot
/// publisher may still be reading the staged blob when the cycle moves on.
#[derive(Default)]
pub struct Artifacts {
    state: Mutex<ArtifactsState>,
}

impl Artifacts {
    /// An empty artifacts bag (no blobs staged yet).
    pub fn new() -> Self {
        Artifacts::default()
    }

    /// Record a staged blob under its kind.
    pub fn set(&self, blob: Blob) {
        let mut state = self.state.lock();
        match blob.kind {
            BlobKind::Delta => state.delta = Some(blob),
            BlobKind::ReverseDelta => state.reverse_delta = Some(blob),
            BlobKind::Snapshot => state.snapshot = Some(blob),
        }
    }

    /// The staged delta blob, if any.
    pub fn delta(&self) -> Option<Blob> {
        self.state.lock().delta.clone()
    }

    /// The staged reverse-delta blob, if any.
    pub fn reverse_delta(&self) -> Option<Blob> {
        self.state.lock().reverse_delta.clone()
    }

    /// The staged snapshot blob, if any.
    pub fn snapshot(&self) -> Option<Blob> {
        self.state.lock().snapshot.clone()
    }

    /// Request cleanup. Drops DELTA/REVERSE_DELTA immediately; drops
    /// SNAPSHOT only if publish-complete has already been signaled.
    /// Idempotent: calling this twice releases each blob exactly once.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        state.delta.take();
        state.reverse_delta.take();
        state.cleanup_requested = true;
        if state.snapshot_publish_complete {
            state.snapshot.take();
        }
    }

    /// Signal that the (possibly deferred) snapshot publish finished.
    /// Drops SNAPSHOT if cleanup was already requested.
    pub fn mark_snapshot_publish_complete(&self) {
        let mut state = self.state.lock();
        state.snapshot_publish_complete = true;
        if state.cleanup_requested {
            state.snapshot.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{BlobHandle, Version};
    use std::sync::Arc;

    fn blob(kind: BlobKind) -> Blob {
        Blob {
            kind,
            from_version: Version::SENTINEL,
            to_version: Version(1),
            handle: BlobHandle::Memory(Arc::new(vec![])),
        }
    }

    #[test]
    fn cleanup_drops_delta_and_reverse_delta_immediately() {
        let artifacts = Artifacts::new();
        artifacts.set(blob(BlobKind::Delta));
        artifacts.set(blob(BlobKind::ReverseDelta));
        artifacts.set(blob(BlobKind::Snapshot));

        artifacts.cleanup();
        assert!(artifacts.delta().is_none());
        assert!(artifacts.reverse_delta().is_none());
        assert!(artifacts.snapshot().is_some());
    }

    #[test]
    fn snapshot_survives_until_both_signals_fire() {
        let artifacts = Artifacts::new();
        artifacts.set(blob(BlobKind::Snapshot));

        artifacts.mark_snapshot_publish_complete();
        assert!(artifacts.snapshot().is_some());

        artifacts.cleanup();
        assert!(artifacts.snapshot().is_none());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let artifacts = Artifacts::new();
        artifacts.set(blob(BlobKind::Delta));
        artifacts.cleanup();
        artifacts.cleanup();
        assert!(artifacts.delta().is_none());
    }

    #[test]
    fn cleanup_first_then_publish_complete_drops_snapshot() {
        let artifacts = Artifacts::new();
        artifacts.set(blob(BlobKind::Snapshot));
        artifacts.cleanup();
        assert!(artifacts.snapshot().is_some());
        artifacts.mark_snapshot_publish_complete();
        assert!(artifacts.snapshot().is_none());
    }
}
