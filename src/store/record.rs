//! Typed access to tagged records and fixed-width counters

use super::keys::{display_key, u64_from_bytes, u64_to_bytes};
use super::KvStore;
use crate::error::{BatchError, Result};
use crate::types::{BatchTx, RecordKind, SendToForeign, StoredRecord};

pub fn encode(record: &StoredRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(BatchError::Encode)
}

pub fn decode(key: &[u8], bytes: &[u8]) -> Result<StoredRecord> {
    serde_json::from_slice(bytes).map_err(|source| BatchError::Decode {
        key: display_key(key),
        source,
    })
}

/// Decode a value that must be a batch
pub fn decode_batch(key: &[u8], bytes: &[u8]) -> Result<BatchTx> {
    match decode(key, bytes)? {
        StoredRecord::Batch(batch) => Ok(batch),
        other => Err(BatchError::UnexpectedRecord {
            key: display_key(key),
            expected: RecordKind::Batch,
            found: other.kind(),
        }),
    }
}

/// Decode a value that must be an unbatched transfer
pub fn decode_transfer(key: &[u8], bytes: &[u8]) -> Result<SendToForeign> {
    match decode(key, bytes)? {
        StoredRecord::Transfer(transfer) => Ok(transfer),
        other => Err(BatchError::UnexpectedRecord {
            key: display_key(key),
            expected: RecordKind::Transfer,
            found: other.kind(),
        }),
    }
}

/// Read an 8-byte big-endian counter, 0 when absent
pub fn get_u64<S: KvStore>(store: &S, key: &[u8]) -> Result<u64> {
    match store.get(key) {
        None => Ok(0),
        Some(bytes) => u64_from_bytes(&bytes).ok_or_else(|| BatchError::MalformedValue {
            key: display_key(key),
            expected: 8,
            got: bytes.len(),
        }),
    }
}

pub fn set_u64<S: KvStore>(store: &mut S, key: &[u8], value: u64) {
    store.set(key.to_vec(), u64_to_bytes(value));
}
