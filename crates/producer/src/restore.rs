//! Boots producer state from a specific prior version.
//!
//! Restoring into a non-empty write engine is undefined, so a fresh
//! [`cadence_core::WriteEngine`] is built and seeded via
//! [`cadence_core::RestoreInto::restore_from`] and only swapped into place
//! after it succeeds — a partially-initialized engine must never become
//! visible.

use crate::read_state_holder::ReadStateHolder;
use cadence_core::{BlobRetriever, CadenceResult, ReadEngine, ReadState, RestoreInto, RestoreStatus, Version};

fn materialize<R: ReadEngine>(retriever: &dyn BlobRetriever, desired: Version) -> CadenceResult<(Version, R)> {
    let mut engine = R::default();

    if let Ok(blob) = retriever.snapshot(desired) {
        engine.load_snapshot(&mut *blob.reader()?)?;
        return Ok((desired, engine));
    }

    let Some(latest_snapshot) = retriever.latest_snapshot_version()? else {
        return Ok((Version::SENTINEL, engine));
    };
    let snapshot_blob = retriever.snapshot(latest_snapshot)?;
    engine.load_snapshot(&mut *snapshot_blob.reader()?)?;

    let mut at = latest_snapshot;
    while at < desired {
        match retriever.delta_after(at)? {
            Some(delta_blob) => {
                engine.apply_delta(&mut *delta_blob.reader()?)?;
                at = delta_blob.to_version;
            }
            None => break,
        }
    }
    Ok((at, engine))
}

/// Restore `holder` and `write_engine` to `desired`.
///
/// A sentinel `desired` is a no-op. Otherwise: materialize a transient
/// consumer from `retriever` by loading its latest snapshot and walking
/// forward through deltas; if the version reached doesn't match `desired`,
/// report a mismatch without touching `holder` or `write_engine`.
pub fn restore<W, R>(
    desired: Version,
    retriever: &dyn BlobRetriever,
    holder: &mut ReadStateHolder<R>,
    write_engine: &mut W,
) -> CadenceResult<RestoreStatus>
where
    W: RestoreInto<R> + Default,
    R: ReadEngine,
{
    if desired.is_sentinel() {
        return Ok(RestoreStatus::NoOp);
    }

    let (actual, engine) = materialize::<R>(retriever, desired)?;
    if actual != desired {
        return Ok(RestoreStatus::Fail { desired, actual });
    }

    let mut fresh = W::default();
    fresh.restore_from(&engine)?;
    *write_engine = fresh;
    holder.install(ReadState::new(actual, engine));

    Ok(RestoreStatus::Success { version: actual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{BlobKind, WriteEngine};
    use cadence_durability::in_memory_blob_store;
    use cadence_state::{FieldValue, MemoryReadEngine, MemoryWriteEngine, ObjectMapper, WriteState};
    use std::io::Write as _;

    struct Movie {
        title: &'static str,
    }
    impl ObjectMapper for Movie {
        fn schema_name(&self) -> &'static str {
            "Movie"
        }
        fn to_fields(&self) -> Vec<FieldValue> {
            vec![FieldValue::Str(self.title.to_string())]
        }
    }

    #[test]
    fn sentinel_desired_is_a_no_op() {
        let (_store, _stager, _publisher, retriever) = in_memory_blob_store();
        let mut holder = ReadStateHolder::<MemoryReadEngine>::new();
        let mut write_engine = MemoryWriteEngine::new();
        let status = restore(Version::SENTINEL, &retriever, &mut holder, &mut write_engine).unwrap();
        assert!(matches!(status, RestoreStatus::NoOp));
        assert!(holder.current().is_none());
    }

    #[test]
    fn restoring_exact_published_version_succeeds() {
        let (_store, stager, publisher, retriever) = in_memory_blob_store();
        let mut source_engine = MemoryWriteEngine::new();
        source_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(1002), &mut source_engine, None);
            ws.add(&Movie { title: "Arrival" });
        }
        let mut writer = stager.open_snapshot(Version(1002)).unwrap();
        source_engine.write_snapshot(&mut writer).unwrap();
        let blob = writer.finish().unwrap();
        publisher.publish(&blob).unwrap();

        let mut holder = ReadStateHolder::<MemoryReadEngine>::new();
        let mut write_engine = MemoryWriteEngine::new();
        let status = restore(Version(1002), &retriever, &mut holder, &mut write_engine).unwrap();
        assert!(matches!(status, RestoreStatus::Success { version } if version == Version(1002)));
        assert_eq!(holder.current().unwrap().version, Version(1002));
    }

    #[test]
    fn requesting_a_version_past_available_history_is_a_mismatch() {
        let (_store, stager, publisher, retriever) = in_memory_blob_store();
        let mut source_engine = MemoryWriteEngine::new();
        source_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(1001), &mut source_engine, None);
            ws.add(&Movie { title: "Arrival" });
        }
        let mut writer = stager.open_snapshot(Version(1001)).unwrap();
        source_engine.write_snapshot(&mut writer).unwrap();
        let blob = writer.finish().unwrap();
        publisher.publish(&blob).unwrap();

        let mut holder = ReadStateHolder::<MemoryReadEngine>::new();
        let mut write_engine = MemoryWriteEngine::new();
        let status = restore(Version(1002), &retriever, &mut holder, &mut write_engine).unwrap();
        assert!(matches!(
            status,
            RestoreStatus::Fail { desired, actual } if desired == Version(1002) && actual == Version(1001)
        ));
        assert!(holder.current().is_none());
        let _ = BlobKind::Snapshot;
    }
}
