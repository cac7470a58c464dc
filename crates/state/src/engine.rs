//! Reference write/read engines: an in-memory, ordinal-addressed columnar
//! store with CRC32-checked snapshot/delta encoding.
//!
//! The columnar write/read state engines are kept out of the core
//! as an assumed-correct external collaborator. This module is that
//! collaborator's reference implementation: simple enough to read in one
//! sitting, but real enough that the producer cycle engine's integrity
//! check has actual bytes to round-trip.

use crate::codec::{self, Op, ShardSnapshot};
use crate::field::{FieldTuple, FieldValue, ObjectMapper};
use cadence_core::{CadenceError, CadenceResult, Checksum, ReadEngine, RestoreInto, WriteEngine};
use rustc_hash::FxHashMap;
use std::io::{Read, Write};

/// One schema's records, addressed by ordinal.
///
/// `slots[i] == None` means ordinal `i` is a hole (its record was removed
/// and has not yet been reused) — ordinals are recycled from the lowest
/// free hole so long-running producers don't grow shards unboundedly.
#[derive(Default, Clone, PartialEq)]
pub(crate) struct Shard {
    pub(crate) slots: Vec<Option<FieldTuple>>,
    index: FxHashMap<FieldTuple, usize>,
}

impl Shard {
    fn rebuild_index(&mut self) {
        self.index.clear();
        for (ordinal, slot) in self.slots.iter().enumerate() {
            if let Some(fields) = slot {
                self.index.insert(fields.clone(), ordinal);
            }
        }
    }

    fn ordinal_of(&self, fields: &FieldTuple) -> Option<usize> {
        self.index.get(fields).copied()
    }

    fn insert_at(&mut self, ordinal: usize, fields: FieldTuple) {
        if ordinal >= self.slots.len() {
            self.slots.resize(ordinal + 1, None);
        }
        self.index.insert(fields.clone(), ordinal);
        self.slots[ordinal] = Some(fields);
    }

    fn remove_at(&mut self, ordinal: usize) -> Option<FieldTuple> {
        let removed = self.slots.get_mut(ordinal).and_then(Option::take);
        if let Some(fields) = &removed {
            self.index.remove(fields);
        }
        removed
    }

    fn first_free_slot(&self) -> usize {
        self.slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len())
    }
}

/// A read-only, ordinal-addressed materialization of one published version.
///
/// O(1) access by `(schema, ordinal)`; equality-based lookup via
/// [`MemoryReadEngine::ordinal_of`] never allocates beyond the caller's own
/// field tuple.
#[derive(Default, Clone)]
pub struct MemoryReadEngine {
    pub(crate) shards: FxHashMap<String, Shard>,
}

impl MemoryReadEngine {
    /// Fetch a record's fields by ordinal, if present.
    pub fn get(&self, schema: &str, ordinal: usize) -> Option<&FieldTuple> {
        self.shards.get(schema)?.slots.get(ordinal)?.as_ref()
    }

    /// Find the ordinal of a record by value equality, without allocating.
    pub fn ordinal_of(&self, schema: &str, fields: &FieldTuple) -> Option<usize> {
        self.shards.get(schema)?.ordinal_of(fields)
    }

    /// Number of populated (non-hole) records in a schema.
    pub fn len(&self, schema: &str) -> usize {
        self.shards
            .get(schema)
            .map(|s| s.slots.iter().filter(|s| s.is_some()).count())
            .unwrap_or(0)
    }

    /// True if a schema has no live records (or doesn't exist).
    pub fn is_empty(&self, schema: &str) -> bool {
        self.len(schema) == 0
    }
}

impl ReadEngine for MemoryReadEngine {
    fn load_snapshot(&mut self, input: &mut dyn Read) -> CadenceResult<()> {
        let snapshot: ShardSnapshot = codec::read_snapshot(input)?;
        self.shards = snapshot
            .shards
            .into_iter()
            .map(|(name, slots)| {
                let mut shard = Shard {
                    slots,
                    index: FxHashMap::default(),
                };
                shard.rebuild_index();
                (name, shard)
            })
            .collect();
        Ok(())
    }

    fn apply_delta(&mut self, input: &mut dyn Read) -> CadenceResult<()> {
        let ops = codec::read_ops(input)?;
        apply_ops(&mut self.shards, &ops);
        Ok(())
    }

    fn checksum(&self, schemas: &[String]) -> Checksum {
        compute_checksum(&self.shards, schemas)
    }

    fn schema_names(&self) -> Vec<String> {
        self.shards.keys().cloned().collect()
    }
}

fn apply_ops(shards: &mut FxHashMap<String, Shard>, ops: &[Op]) {
    for op in ops {
        let shard = shards.entry(op.schema().to_string()).or_default();
        match op {
            Op::Add { ordinal, fields, .. } => shard.insert_at(*ordinal, fields.clone()),
            Op::Remove { ordinal, .. } => {
                shard.remove_at(*ordinal);
            }
        }
    }
}

fn compute_checksum(shards: &FxHashMap<String, Shard>, schemas: &[String]) -> Checksum {
    let mut names: Vec<&String> = schemas.iter().filter(|s| shards.contains_key(*s)).collect();
    names.sort();
    let mut hasher = crc32fast::Hasher::new();
    for name in names {
        hasher.update(name.as_bytes());
        let shard = &shards[name];
        for (ordinal, slot) in shard.slots.iter().enumerate() {
            if let Some(fields) = slot {
                let encoded = bincode::serialize(&(ordinal, fields))
                    .expect("field tuples are always serializable");
                hasher.update(&encoded);
            }
        }
    }
    Checksum(hasher.finalize())
}

/// Mutable staging area: the reference `WriteEngine`.
///
/// Tracks the ops applied since the last `prepare_for_next_cycle` so that
/// forward and reverse deltas can be derived directly from the op log
/// instead of diffing two full snapshots.
#[derive(Default)]
pub struct MemoryWriteEngine {
    pub(crate) shards: FxHashMap<String, Shard>,
    pending_ops: Vec<Op>,
}

impl MemoryWriteEngine {
    /// Create an empty write engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn add_fields(&mut self, schema: &'static str, fields: FieldTuple) -> usize {
        let shard = self.shards.entry(schema.to_string()).or_default();
        if let Some(existing) = shard.ordinal_of(&fields) {
            return existing;
        }
        let ordinal = shard.first_free_slot();
        shard.insert_at(ordinal, fields.clone());
        self.pending_ops.push(Op::Add {
            schema: schema.to_string(),
            ordinal,
            fields,
        });
        ordinal
    }

    fn remove_fields(&mut self, schema: &'static str, fields: &FieldTuple) -> bool {
        let Some(shard) = self.shards.get_mut(schema) else {
            return false;
        };
        let Some(ordinal) = shard.ordinal_of(fields) else {
            return false;
        };
        let removed = shard.remove_at(ordinal).expect("ordinal_of found it");
        self.pending_ops.push(Op::Remove {
            schema: schema.to_string(),
            ordinal,
            fields: removed,
        });
        true
    }

    fn undo_pending(&mut self) {
        for op in self.pending_ops.drain(..).rev() {
            match op {
                Op::Add { schema, ordinal, .. } => {
                    if let Some(shard) = self.shards.get_mut(&schema) {
                        shard.remove_at(ordinal);
                    }
                }
                Op::Remove { schema, ordinal, fields } => {
                    self.shards.entry(schema).or_default().insert_at(ordinal, fields);
                }
            }
        }
    }
}

impl WriteEngine for MemoryWriteEngine {
    fn prepare_for_next_cycle(&mut self) {
        self.pending_ops.clear();
    }

    fn has_changed_since_last_cycle(&self) -> bool {
        !self.pending_ops.is_empty()
    }

    fn reset_to_last_prepare(&mut self) {
        self.undo_pending();
    }

    fn write_snapshot(&self, out: &mut dyn Write) -> CadenceResult<()> {
        let snapshot = ShardSnapshot {
            shards: self
                .shards
                .iter()
                .map(|(name, shard)| (name.clone(), shard.slots.clone()))
                .collect(),
        };
        codec::write_snapshot(out, &snapshot)
    }

    fn write_delta(&self, out: &mut dyn Write) -> CadenceResult<()> {
        codec::write_ops(out, &self.pending_ops)
    }

    fn write_reverse_delta(&self, out: &mut dyn Write) -> CadenceResult<()> {
        let reverse: Vec<Op> = self.pending_ops.iter().rev().map(Op::invert).collect();
        codec::write_ops(out, &reverse)
    }
}

impl RestoreInto<MemoryReadEngine> for MemoryWriteEngine {
    fn restore_from(&mut self, read_engine: &MemoryReadEngine) -> CadenceResult<()> {
        if !self.shards.is_empty() || !self.pending_ops.is_empty() {
            return Err(CadenceError::InvalidConfiguration(
                "restore_from requires a freshly constructed write engine".into(),
            ));
        }
        self.shards = read_engine.shards.clone();
        Ok(())
    }
}

/// The populator's mutable view for the next version.
///
/// Bound to `(to_version, engine, prior)` for the duration of one populate
/// phase. Populators call [`add`](WriteState::add)/[`remove`](WriteState::remove)
/// with their own domain types; `WriteState` maps them through
/// [`ObjectMapper`] onto the underlying [`MemoryWriteEngine`].
pub struct WriteState<'a> {
    to_version: cadence_core::Version,
    engine: &'a mut MemoryWriteEngine,
    prior: Option<cadence_core::ReadState<MemoryReadEngine>>,
}

impl<'a> WriteState<'a> {
    /// Construct a write state bound to the given cycle (internal: built by
    /// the producer, not by user code).
    pub fn new(
        to_version: cadence_core::Version,
        engine: &'a mut MemoryWriteEngine,
        prior: Option<cadence_core::ReadState<MemoryReadEngine>>,
    ) -> Self {
        WriteState { to_version, engine, prior }
    }

    /// The version this populate phase is producing.
    pub fn to_version(&self) -> cadence_core::Version {
        self.to_version
    }

    /// The read state the dataset was at before this cycle, if any.
    pub fn prior(&self) -> Option<&cadence_core::ReadState<MemoryReadEngine>> {
        self.prior.as_ref()
    }

    /// Add a record. A no-op (and not counted as a change) if an
    /// equal-by-value record is already present in its schema.
    pub fn add<T: ObjectMapper>(&mut self, record: &T) -> usize {
        self.engine.add_fields(record.schema_name(), record.to_fields())
    }

    /// Remove a record by value equality. Returns `true` if a matching
    /// record was found and removed.
    pub fn remove<T: ObjectMapper>(&mut self, record: &T) -> bool {
        self.engine.remove_fields(record.schema_name(), &record.to_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Movie {
        title: &'static str,
        year: i64,
    }

    impl ObjectMapper for Movie {
        fn schema_name(&self) -> &'static str {
            "Movie"
        }

        fn to_fields(&self) -> FieldTuple {
            vec![FieldValue::Str(self.title.to_string()), FieldValue::Int(self.year)]
        }
    }

    #[test]
    fn add_then_snapshot_then_checksum_matches_across_independent_engines() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival", year: 2016 });
            ws.add(&Movie { title: "Her", year: 2013 });
        }
        assert!(write_engine.has_changed_since_last_cycle());

        let mut bytes = Vec::new();
        write_engine.write_snapshot(&mut bytes).unwrap();

        let mut read_a = MemoryReadEngine::default();
        read_a.load_snapshot(&mut bytes.as_slice()).unwrap();
        let mut read_b = MemoryReadEngine::default();
        read_b.load_snapshot(&mut bytes.as_slice()).unwrap();

        let schemas = vec!["Movie".to_string()];
        assert_eq!(read_a.checksum(&schemas), read_b.checksum(&schemas));
        assert_eq!(read_a.len("Movie"), 2);
    }

    #[test]
    fn forward_and_reverse_delta_round_trip() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival", year: 2016 });
        }
        let mut snap = Vec::new();
        write_engine.write_snapshot(&mut snap).unwrap();
        let mut current = MemoryReadEngine::default();
        current.load_snapshot(&mut snap.as_slice()).unwrap();

        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(2), &mut write_engine, None);
            ws.add(&Movie { title: "Her", year: 2013 });
            ws.remove(&Movie { title: "Arrival", year: 2016 });
        }
        let mut delta = Vec::new();
        write_engine.write_delta(&mut delta).unwrap();
        let mut reverse_delta = Vec::new();
        write_engine.write_reverse_delta(&mut reverse_delta).unwrap();

        let mut pending = current.clone();
        pending.apply_delta(&mut delta.as_slice()).unwrap();
        assert_eq!(pending.len("Movie"), 1);
        assert!(pending.ordinal_of("Movie", &vec![FieldValue::Str("Her".into()), FieldValue::Int(2013)]).is_some());

        let mut roundtrip = pending.clone();
        roundtrip.apply_delta(&mut reverse_delta.as_slice()).unwrap();

        let schemas = vec!["Movie".to_string()];
        assert_eq!(roundtrip.checksum(&schemas), current.checksum(&schemas));
    }

    #[test]
    fn reset_to_last_prepare_undoes_populate() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival", year: 2016 });
        }
        write_engine.reset_to_last_prepare();
        assert!(!write_engine.has_changed_since_last_cycle());
        let mut bytes = Vec::new();
        write_engine.write_snapshot(&mut bytes).unwrap();
        let mut read = MemoryReadEngine::default();
        read.load_snapshot(&mut bytes.as_slice()).unwrap();
        assert!(read.is_empty("Movie"));
    }

    #[test]
    fn duplicate_add_is_idempotent_and_not_dirty() {
        let mut write_engine = MemoryWriteEngine::new();
        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(1), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival", year: 2016 });
        }
        let mut snap = Vec::new();
        write_engine.write_snapshot(&mut snap).unwrap();

        write_engine.prepare_for_next_cycle();
        {
            let mut ws = WriteState::new(cadence_core::Version(2), &mut write_engine, None);
            ws.add(&Movie { title: "Arrival", year: 2016 });
        }
        assert!(!write_engine.has_changed_since_last_cycle());
    }
}
