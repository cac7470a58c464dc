//! Fan-out of lifecycle events to registered listeners.
//!
//! Every dispatch is wrapped in [`std::panic::catch_unwind`]: a listener
//! that panics must not abort the cycle any more than one that simply
//! returns an error would. Both are logged at `warn` and dropped.

use cadence_core::{BlobKind, CycleStatus, Listener, RestoreStatus, Version};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Broadcasts lifecycle events to every registered [`Listener`].
pub struct ListenerBroadcaster {
    listeners: Vec<Arc<dyn Listener>>,
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        for listener in &$self.listeners {
            let listener = listener.clone();
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener.$method($($arg),*)));
            if let Err(panic) = result {
                let message = panic_message(&panic);
                warn!(target: "cadence::listener", event = stringify!($method), error = %message, "listener panicked");
            }
        }
    };
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked with a non-string payload".to_string()
    }
}

impl ListenerBroadcaster {
    /// Build a broadcaster over the given listeners.
    pub fn new(listeners: Vec<Arc<dyn Listener>>) -> Self {
        ListenerBroadcaster { listeners }
    }

    /// Fired once when a producer is constructed.
    pub fn producer_init(&self) {
        dispatch!(self, on_producer_init);
    }

    /// Start of a cycle.
    pub fn cycle_start(&self, to_version: Version) {
        dispatch!(self, on_cycle_start, to_version);
    }

    /// Fired instead of the usual cycle-start follow-up when there is no
    /// current read state yet.
    pub fn new_delta_chain(&self, to_version: Version) {
        dispatch!(self, on_new_delta_chain, to_version);
    }

    /// Start of the populate phase.
    pub fn populate_start(&self, to_version: Version) {
        dispatch!(self, on_populate_start, to_version);
    }

    /// End of the populate phase.
    pub fn populate_complete(&self, to_version: Version, duration: Duration, result: &cadence_core::CadenceResult<()>) {
        dispatch!(self, on_populate_complete, to_version, duration, result);
    }

    /// Populator ran but produced no change.
    pub fn no_delta(&self, to_version: Version) {
        dispatch!(self, on_no_delta, to_version);
    }

    /// Start of the publish phase.
    pub fn publish_start(&self, to_version: Version) {
        dispatch!(self, on_publish_start, to_version);
    }

    /// One blob finished staging and publishing.
    pub fn artifact_publish(
        &self,
        kind: BlobKind,
        to_version: Version,
        duration: Duration,
        result: &cadence_core::CadenceResult<()>,
    ) {
        dispatch!(self, on_artifact_publish, kind, to_version, duration, result);
    }

    /// End of the publish phase.
    pub fn publish_complete(&self, to_version: Version, duration: Duration) {
        dispatch!(self, on_publish_complete, to_version, duration);
    }

    /// Start of the integrity check.
    pub fn integrity_start(&self, to_version: Version) {
        dispatch!(self, on_integrity_start, to_version);
    }

    /// End of the integrity check.
    pub fn integrity_complete(&self, to_version: Version, duration: Duration, result: &cadence_core::CadenceResult<()>) {
        dispatch!(self, on_integrity_complete, to_version, duration, result);
    }

    /// Start of validation.
    pub fn validation_start(&self, to_version: Version) {
        dispatch!(self, on_validation_start, to_version);
    }

    /// End of validation.
    pub fn validation_complete(&self, to_version: Version, duration: Duration, result: &cadence_core::CadenceResult<()>) {
        dispatch!(self, on_validation_complete, to_version, duration, result);
    }

    /// Start of announcement.
    pub fn announcement_start(&self, to_version: Version) {
        dispatch!(self, on_announcement_start, to_version);
    }

    /// End of announcement.
    pub fn announcement_complete(
        &self,
        to_version: Version,
        duration: Duration,
        result: &cadence_core::CadenceResult<()>,
    ) {
        dispatch!(self, on_announcement_complete, to_version, duration, result);
    }

    /// Start of a restore.
    pub fn restore_start(&self, desired: Version) {
        dispatch!(self, on_restore_start, desired);
    }

    /// End of a restore.
    pub fn restore_complete(&self, status: &RestoreStatus) {
        dispatch!(self, on_restore_complete, status);
    }

    /// End of a cycle, regardless of outcome.
    pub fn cycle_complete(&self, status: &CycleStatus) {
        dispatch!(self, on_cycle_complete, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingListener;
    impl Listener for PanickingListener {
        fn on_cycle_start(&self, _to_version: Version) {
            panic!("boom");
        }
    }

    struct CountingListener(Arc<AtomicUsize>);
    impl Listener for CountingListener {
        fn on_cycle_start(&self, _to_version: Version) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch_to_later_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let broadcaster = ListenerBroadcaster::new(vec![
            Arc::new(PanickingListener),
            Arc::new(CountingListener(count.clone())),
        ]);
        broadcaster.cycle_start(Version(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
