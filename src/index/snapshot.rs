// Binary snapshot format, all integers little-endian:
//
//   magic      4 bytes  "GMIX"
//   version    u32
//   metric     u8       0 = L2
//   dimension  u32
//   count      u64
//   ledger     32 bytes SHA-256 of the paired filename ledger, zero if unbound
//   values     count * dimension f32

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{Metric, VectorIndex};
use crate::{MemoryError, Result};

const MAGIC: &[u8; 4] = b"GMIX";
const FORMAT_VERSION: u32 = 2;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 4 + 4 + 1 + 4 + 8 + DIGEST_LEN;

/// SHA-256 of the filename ledger a snapshot was saved with
pub type LedgerDigest = [u8; DIGEST_LEN];

/// Digest stored by snapshots that are not paired with a ledger
pub const UNBOUND: LedgerDigest = [0; DIGEST_LEN];

/// A decoded snapshot file
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: VectorIndex,
    pub ledger_digest: LedgerDigest,
}

fn metric_id(metric: Metric) -> u8 {
    match metric {
        Metric::L2 => 0,
    }
}

fn metric_from_id(id: u8) -> Result<Metric> {
    match id {
        0 => Ok(Metric::L2),
        other => Err(MemoryError::Snapshot(format!("unknown metric id {}", other))),
    }
}

/// Encode an index into snapshot bytes, bound to `ledger_digest`
#[inline]
pub fn encode(index: &VectorIndex, ledger_digest: &LedgerDigest) -> Result<Vec<u8>> {
    let dimension = u32::try_from(index.dimension()).map_err(|_| {
        MemoryError::Snapshot(format!("dimension {} does not fit in u32", index.dimension()))
    })?;
    let count = index.len() as u64;
    let values = index.raw_values();

    let mut bytes = Vec::with_capacity(HEADER_LEN + std::mem::size_of_val(values));
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.push(metric_id(index.metric()));
    bytes.extend_from_slice(&dimension.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(ledger_digest);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    Ok(bytes)
}

/// Decode snapshot bytes back into an index and its ledger digest
#[inline]
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(MemoryError::Snapshot(format!(
            "snapshot is {} bytes, shorter than the {} byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[0..4] != MAGIC {
        return Err(MemoryError::Snapshot("bad magic bytes".to_string()));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(MemoryError::Snapshot(format!(
            "unsupported format version {}",
            version
        )));
    }

    let metric = metric_from_id(header[8])?;
    let dimension = u32::from_le_bytes([header[9], header[10], header[11], header[12]]) as usize;
    let count = u64::from_le_bytes([
        header[13], header[14], header[15], header[16], header[17], header[18], header[19],
        header[20],
    ]);
    let mut ledger_digest = UNBOUND;
    ledger_digest.copy_from_slice(&header[21..HEADER_LEN]);

    let expected_len = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(dimension))
        .and_then(|values| values.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| MemoryError::Snapshot("vector count overflows".to_string()))?;

    if body.len() != expected_len {
        return Err(MemoryError::Snapshot(format!(
            "expected {} bytes of vector data, found {}",
            expected_len,
            body.len()
        )));
    }

    let data = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(Snapshot {
        index: VectorIndex::from_raw_parts(dimension, metric, data)?,
        ledger_digest,
    })
}

pub(crate) fn read_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Err(MemoryError::IndexNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    let snapshot = decode(&bytes)?;

    debug!(
        "Loaded index snapshot with {} vectors from {}",
        snapshot.index.len(),
        path.display()
    );
    Ok(snapshot)
}
