//! Binary wire format for snapshots and deltas.
//!
//! Every blob is an `Envelope`: a small fixed header, a bincode-encoded
//! payload, and a CRC32 footer over everything before it. The footer lets a
//! reader detect a truncated or bit-flipped blob before bincode ever gets a
//! chance to panic on garbage length prefixes.

use crate::field::FieldTuple;
use cadence_core::{CadenceError, CadenceResult};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const MAGIC: [u8; 4] = *b"CADB";
const FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
enum PayloadKind {
    Snapshot,
    Ops,
}

/// A single recorded mutation, captured in populate order.
///
/// Forward deltas replay a cycle's ops as-is; reverse deltas replay
/// [`Op::invert`] of each op in reverse order. Because both sides of an
/// integrity check replay the same explicit ops rather than recomputing an
/// independent diff, their checksums are guaranteed to agree bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Insert `fields` at `ordinal` in `schema`.
    Add {
        /// Schema the record belongs to.
        schema: String,
        /// Ordinal the record was placed at.
        ordinal: usize,
        /// The record's flattened fields.
        fields: FieldTuple,
    },
    /// Remove the record at `ordinal` in `schema`. `fields` is carried so the
    /// op can be inverted back into an `Add` without consulting the engine.
    Remove {
        /// Schema the record belongs to.
        schema: String,
        /// Ordinal the record was removed from.
        ordinal: usize,
        /// The removed record's flattened fields.
        fields: FieldTuple,
    },
}

impl Op {
    /// The schema this op applies to.
    pub fn schema(&self) -> &str {
        match self {
            Op::Add { schema, .. } | Op::Remove { schema, .. } => schema,
        }
    }

    /// The op that undoes this one.
    pub fn invert(&self) -> Op {
        match self {
            Op::Add { schema, ordinal, fields } => Op::Remove {
                schema: schema.clone(),
                ordinal: *ordinal,
                fields: fields.clone(),
            },
            Op::Remove { schema, ordinal, fields } => Op::Add {
                schema: schema.clone(),
                ordinal: *ordinal,
                fields: fields.clone(),
            },
        }
    }
}

/// The full ordinal-addressed contents of every schema, as staged for a
/// snapshot write.
#[derive(Serialize, Deserialize)]
pub struct ShardSnapshot {
    /// Schema name to its ordinal-indexed slots (holes are `None`).
    pub shards: std::collections::BTreeMap<String, Vec<Option<FieldTuple>>>,
}

fn write_envelope(out: &mut dyn Write, kind: PayloadKind, payload: &[u8]) -> CadenceResult<()> {
    let mut body = Vec::with_capacity(payload.len() + 16);
    body.extend_from_slice(&MAGIC);
    body.push(FORMAT_VERSION);
    let kind_byte = match kind {
        PayloadKind::Snapshot => 0u8,
        PayloadKind::Ops => 1u8,
    };
    body.push(kind_byte);
    body.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    body.extend_from_slice(payload);

    let checksum = crc32fast::hash(&body);
    out.write_all(&body)
        .and_then(|_| out.write_all(&checksum.to_le_bytes()))
        .map_err(|e| CadenceError::PublisherIo(e.to_string()))
}

fn read_envelope(input: &mut dyn Read, expected: PayloadKind) -> CadenceResult<Vec<u8>> {
    let mut body = Vec::new();
    input
        .read_to_end(&mut body)
        .map_err(|e| CadenceError::PublisherIo(e.to_string()))?;

    if body.len() < 4 + 1 + 1 + 8 + 4 {
        return Err(CadenceError::PublisherIo("envelope shorter than its fixed header".into()));
    }
    let footer_at = body.len() - 4;
    let (payload_region, footer) = body.split_at(footer_at);
    let expected_checksum = u32::from_le_bytes(footer.try_into().unwrap());
    let actual_checksum = crc32fast::hash(payload_region);
    if actual_checksum != expected_checksum {
        return Err(CadenceError::PublisherIo(format!(
            "envelope checksum mismatch: expected {expected_checksum:08x}, got {actual_checksum:08x}"
        )));
    }

    if payload_region[0..4] != MAGIC {
        return Err(CadenceError::Populator("bad envelope magic".into()));
    }
    if payload_region[4] != FORMAT_VERSION {
        return Err(CadenceError::Populator(format!(
            "unsupported envelope format version {}",
            payload_region[4]
        )));
    }
    let kind_byte = payload_region[5];
    let matches_expected = matches!(
        (kind_byte, &expected),
        (0, PayloadKind::Snapshot) | (1, PayloadKind::Ops)
    );
    if !matches_expected {
        return Err(CadenceError::Populator("envelope payload kind mismatch".into()));
    }
    let len = u64::from_le_bytes(payload_region[6..14].try_into().unwrap()) as usize;
    let payload = &payload_region[14..14 + len];
    Ok(payload.to_vec())
}

/// Write a full-state snapshot envelope.
pub fn write_snapshot(out: &mut dyn Write, snapshot: &ShardSnapshot) -> CadenceResult<()> {
    let payload = bincode::serialize(snapshot)
        .map_err(|e| CadenceError::Populator(format!("snapshot encode failed: {e}")))?;
    write_envelope(out, PayloadKind::Snapshot, &payload)
}

/// Read a full-state snapshot envelope.
pub fn read_snapshot(input: &mut dyn Read) -> CadenceResult<ShardSnapshot> {
    let payload = read_envelope(input, PayloadKind::Snapshot)?;
    bincode::deserialize(&payload).map_err(|e| CadenceError::Populator(format!("snapshot decode failed: {e}")))
}

/// Write a delta (or reverse-delta) op-log envelope.
pub fn write_ops(out: &mut dyn Write, ops: &[Op]) -> CadenceResult<()> {
    let payload =
        bincode::serialize(ops).map_err(|e| CadenceError::Populator(format!("delta encode failed: {e}")))?;
    write_envelope(out, PayloadKind::Ops, &payload)
}

/// Read a delta (or reverse-delta) op-log envelope.
pub fn read_ops(input: &mut dyn Read) -> CadenceResult<Vec<Op>> {
    let payload = read_envelope(input, PayloadKind::Ops)?;
    bincode::deserialize(&payload).map_err(|e| CadenceError::Populator(format!("delta decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    #[test]
    fn snapshot_round_trips() {
        let mut shards = std::collections::BTreeMap::new();
        shards.insert(
            "Movie".to_string(),
            vec![Some(vec![FieldValue::Str("Arrival".into()), FieldValue::Int(2016)])],
        );
        let snapshot = ShardSnapshot { shards };
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot).unwrap();
        let decoded = read_snapshot(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.shards.len(), 1);
    }

    #[test]
    fn corrupted_envelope_fails_checksum() {
        let ops = vec![Op::Add {
            schema: "Movie".into(),
            ordinal: 0,
            fields: vec![FieldValue::Int(1)],
        }];
        let mut bytes = Vec::new();
        write_ops(&mut bytes, &ops).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(read_ops(&mut bytes.as_slice()).is_err());
    }

    #[test]
    fn op_invert_round_trips() {
        let add = Op::Add {
            schema: "Movie".into(),
            ordinal: 3,
            fields: vec![FieldValue::Int(7)],
        };
        assert_eq!(add.invert().invert(), add);
    }
}
