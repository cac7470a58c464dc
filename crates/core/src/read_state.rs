//! Read states: a version bound to a materialized read engine.

use crate::version::Version;
use std::sync::Arc;

/// An immutable materialization of one published version.
///
/// Cheap to clone — the read engine itself is shared via `Arc` so that
/// consumers (and validators) holding a `ReadState` keep a stable view even
/// after the producer rotates its holder.
#[derive(Clone)]
pub struct ReadState<R> {
    /// The version this state was materialized at.
    pub version: Version,
    /// The materialized read engine.
    pub engine: Arc<R>,
}

impl<R> ReadState<R> {
    /// Wrap a read engine at the given version.
    pub fn new(version: Version, engine: R) -> Self {
        ReadState {
            version,
            engine: Arc::new(engine),
        }
    }
}
