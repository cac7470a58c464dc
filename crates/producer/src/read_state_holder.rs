//! Pair (current, pending) of materialized read states.
//!
//! `current` is published through an [`arc_swap::ArcSwapOption`] so readers
//! on other threads observe the commit step's rotation under a release-
//! acquire barrier without taking a lock. The `base`/`pending` scratch
//! slots used mid-cycle are plain fields: all holder mutation except the
//! final publish happens on the cycle thread, so they need no atomics of
//! their own.

use arc_swap::ArcSwapOption;
use cadence_core::{ReadEngine, ReadState};
use std::sync::Arc;

/// Holds at most two read states, labeled *current* (published, externally
/// visible) and *pending*/*base* (cycle-local, mid-rotation bookkeeping).
pub struct ReadStateHolder<R: ReadEngine> {
    published: ArcSwapOption<ReadState<R>>,
    base: Option<Arc<ReadState<R>>>,
    pending: Option<Arc<ReadState<R>>>,
}

impl<R: ReadEngine> ReadStateHolder<R> {
    /// An empty holder (no cycle has ever committed).
    pub fn new() -> Self {
        ReadStateHolder {
            published: ArcSwapOption::empty(),
            base: None,
            pending: None,
        }
    }

    /// The externally visible current read state, if any.
    pub fn current(&self) -> Option<Arc<ReadState<R>>> {
        self.published.load_full()
    }

    /// Start a cycle's rotation: the published current (if any) becomes
    /// `base`, and `pending` is set to the freshly materialized state.
    /// `published` is untouched until [`commit`](Self::commit).
    pub fn roundtrip(&mut self, pending: ReadState<R>) {
        self.base = self.published.load_full();
        self.pending = Some(Arc::new(pending));
    }

    /// Replace `base` with a re-materialized read state proven equivalent
    /// by the reverse-delta round trip. Has no
    /// externally observable effect — `published` only changes at
    /// [`commit`](Self::commit) — but lets the engine adopt the freshly
    /// round-tripped instance for the next cycle's continuity bookkeeping.
    pub fn swap(&mut self, reverse_applied: ReadState<R>) {
        self.base = Some(Arc::new(reverse_applied));
    }

    /// Drop `base`, publish `pending` as the new current, and clear the
    /// scratch slots.
    pub fn commit(&mut self) {
        self.base = None;
        if let Some(pending) = self.pending.take() {
            self.published.store(Some(pending));
        }
    }

    /// Directly install a read state as the published current, bypassing
    /// the roundtrip/swap/commit dance. Used by restore, which has no
    /// prior cycle to rotate away from.
    pub fn install(&mut self, state: ReadState<R>) {
        self.published.store(Some(Arc::new(state)));
    }

    /// Discard this cycle's scratch state without touching `published`.
    pub fn rollback(&mut self) {
        self.base = None;
        self.pending = None;
    }

    /// The cycle-local base read state (the pre-cycle current), if any.
    pub fn base(&self) -> Option<Arc<ReadState<R>>> {
        self.base.clone()
    }

    /// The cycle-local pending read state (this cycle's candidate), if any.
    pub fn pending(&self) -> Option<Arc<ReadState<R>>> {
        self.pending.clone()
    }
}

impl<R: ReadEngine> Default for ReadStateHolder<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Version;
    use cadence_state::MemoryReadEngine;

    fn read_state(version: i64) -> ReadState<MemoryReadEngine> {
        ReadState::new(Version(version), MemoryReadEngine::default())
    }

    #[test]
    fn empty_then_commit_becomes_single() {
        let mut holder: ReadStateHolder<MemoryReadEngine> = ReadStateHolder::new();
        assert!(holder.current().is_none());
        holder.roundtrip(read_state(1));
        holder.commit();
        assert_eq!(holder.current().unwrap().version, Version(1));
        assert!(holder.pending().is_none());
        assert!(holder.base().is_none());
    }

    #[test]
    fn rollback_leaves_published_untouched() {
        let mut holder: ReadStateHolder<MemoryReadEngine> = ReadStateHolder::new();
        holder.roundtrip(read_state(1));
        holder.commit();

        holder.roundtrip(read_state(2));
        assert_eq!(holder.base().unwrap().version, Version(1));
        holder.rollback();

        assert_eq!(holder.current().unwrap().version, Version(1));
        assert!(holder.pending().is_none());
        assert!(holder.base().is_none());
    }

    #[test]
    fn swap_replaces_base_without_affecting_published() {
        let mut holder: ReadStateHolder<MemoryReadEngine> = ReadStateHolder::new();
        holder.roundtrip(read_state(1));
        holder.commit();

        holder.roundtrip(read_state(2));
        holder.swap(read_state(1));
        assert_eq!(holder.current().unwrap().version, Version(1));

        holder.commit();
        assert_eq!(holder.current().unwrap().version, Version(2));
        assert!(holder.base().is_none());
    }
}
