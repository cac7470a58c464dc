//! The integrity check: proves, before announcing, that the staged delta
//! and reverse-delta round-trip between the current and pending read
//! states under a common-schema checksum — the hard kernel of the whole cycle.

use crate::artifacts::Artifacts;
use crate::read_state_holder::ReadStateHolder;
use cadence_core::{BlobKind, CadenceError, CadenceResult, ReadEngine, ReadState, Version};
use tracing::{debug, warn};

fn common_schemas<R: ReadEngine>(a: &R, b: &R) -> Vec<String> {
    let b_names: std::collections::HashSet<String> = b.schema_names().into_iter().collect();
    let mut common: Vec<String> = a.schema_names().into_iter().filter(|s| b_names.contains(s)).collect();
    common.sort();
    common
}

/// Proves the staged artifacts are consistent with the previous announced
/// state and rotates `holder` accordingly.
///
/// Materializes the staged snapshot into a fresh read engine, rotates
/// `holder` via [`ReadStateHolder::roundtrip`], and — if a prior state
/// existed — checks both round trips. On success the holder's `base` slot
/// is replaced with the reverse-delta-validated engine via
/// [`ReadStateHolder::swap`]. On any failure, `holder`'s `base`/`pending`
/// are left set for the caller to [`ReadStateHolder::rollback`].
pub fn check_integrity<R: ReadEngine>(
    holder: &mut ReadStateHolder<R>,
    artifacts: &Artifacts,
    to_version: Version,
) -> CadenceResult<()> {
    let snapshot_blob = artifacts
        .snapshot()
        .ok_or_else(|| CadenceError::PublisherIo("no snapshot was staged for integrity check".into()))?;
    let mut pending_engine = R::default();
    pending_engine.load_snapshot(&mut *snapshot_blob.reader()?)?;
    let pending_state = ReadState::new(to_version, pending_engine);

    holder.roundtrip(pending_state);

    let Some(base) = holder.base() else {
        debug!(target: "cadence::integrity", %to_version, "no prior state; pending becomes current unchecked");
        return Ok(());
    };
    let pending = holder.pending().expect("roundtrip just set pending");

    let schemas = common_schemas(&*base.engine, &*pending.engine);
    let current_checksum = base.engine.checksum(&schemas);
    let pending_checksum = pending.engine.checksum(&schemas);

    let Some(delta_blob) = artifacts.delta() else {
        warn!(target: "cadence::integrity", %to_version, "prior state exists but no delta was staged");
        return Err(CadenceError::ChecksumValidation { kind: BlobKind::Delta });
    };
    let mut forward_copy = (*base.engine).clone();
    forward_copy.apply_delta(&mut *delta_blob.reader()?)?;
    let forward_checksum = forward_copy.checksum(&schemas);
    if forward_checksum != pending_checksum {
        warn!(target: "cadence::integrity", %to_version, "forward delta checksum mismatch");
        return Err(CadenceError::ChecksumValidation { kind: BlobKind::Delta });
    }

    let Some(reverse_blob) = artifacts.reverse_delta() else {
        warn!(target: "cadence::integrity", %to_version, "prior state exists but no reverse delta was staged");
        return Err(CadenceError::ChecksumValidation { kind: BlobKind::ReverseDelta });
    };
    let mut reverse_copy = (*pending.engine).clone();
    reverse_copy.apply_delta(&mut *reverse_blob.reader()?)?;
    let reverse_checksum = reverse_copy.checksum(&schemas);
    if reverse_checksum != current_checksum {
        warn!(target: "cadence::integrity", %to_version, "reverse delta checksum mismatch");
        return Err(CadenceError::ChecksumValidation { kind: BlobKind::ReverseDelta });
    }

    holder.swap(ReadState::new(base.version, reverse_copy));
    debug!(target: "cadence::integrity", %to_version, "both round trips validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Artifacts;
    use cadence_core::{Blob, BlobHandle, WriteEngine};
    use cadence_state::{FieldValue, MemoryWriteEngine, ObjectMapper, WriteState};
    use std::sync::Arc;

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

    fn stage(kind: BlobKind, bytes: Vec<u8>, from: Version, to: Version) -> Blob {
        Blob {
            kind,
            from_version: from,
            to_version: to,
            handle: BlobHandle::Memory(Arc::new(bytes)),
        }
    }

    #[test]
    fn first_cycle_has_no_base_and_succeeds_unchecked() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival" });
        }
        let mut snap = Vec::new();
        write_engine.write_snapshot(&mut snap).unwrap();

        let artifacts = Artifacts::new();
        artifacts.set(stage(BlobKind::Snapshot, snap, Version::SENTINEL, Version(1)));

        let mut holder = ReadStateHolder::<cadence_state::MemoryReadEngine>::new();
        check_integrity(&mut holder, &artifacts, Version(1)).unwrap();
        holder.commit();
        assert_eq!(holder.current().unwrap().version, Version(1));
    }

    #[test]
    fn corrupted_delta_fails_checksum() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival" });
        }
        let mut snap1 = Vec::new();
        write_engine.write_snapshot(&mut snap1).unwrap();

        let mut holder = ReadStateHolder::<cadence_state::MemoryReadEngine>::new();
        let artifacts1 = Artifacts::new();
        artifacts1.set(stage(BlobKind::Snapshot, snap1, Version::SENTINEL, Version(1)));
        check_integrity(&mut holder, &artifacts1, Version(1)).unwrap();
        holder.commit();

        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(2), &mut write_engine, None);
            ws.add(&Movie { title: "Her" });
        }
        let mut snap2 = Vec::new();
        write_engine.write_snapshot(&mut snap2).unwrap();
        let mut reverse = Vec::new();
        write_engine.write_reverse_delta(&mut reverse).unwrap();

        // A delta that doesn't actually correspond to the 1->2 transition:
        // valid wire format, wrong content, so the semantic checksum fails
        // rather than the envelope's own CRC.
        let mut bogus_engine = MemoryWriteEngine::new();
        bogus_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(Version(2), &mut bogus_engine, None);
            ws.add(&Movie { title: "Wrong" });
        }
        let mut delta = Vec::new();
        bogus_engine.write_delta(&mut delta).unwrap();

        let artifacts2 = Artifacts::new();
        artifacts2.set(stage(BlobKind::Snapshot, snap2, Version::SENTINEL, Version(2)));
        artifacts2.set(stage(BlobKind::Delta, delta, Version(1), Version(2)));
        artifacts2.set(stage(BlobKind::ReverseDelta, reverse, Version(2), Version(1)));

        let result = check_integrity(&mut holder, &artifacts2, Version(2));
        assert!(matches!(
            result,
            Err(CadenceError::ChecksumValidation { kind: BlobKind::Delta })
        ));
        holder.rollback();
        assert_eq!(holder.current().unwrap().version, Version(1));
    }
}
