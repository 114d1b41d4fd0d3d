use crate::error::Result;
use crate::store::{keys::LAST_OUTGOING_BATCH_NONCE_KEY, record, KvStore};

/// Global batch nonce counter
///
/// Shared by every token contract so relayers see one total order over all
/// batches. The counter cell is only reachable through this type.
pub struct NonceAllocator;

impl NonceAllocator {
    /// Persist and return the next nonce; the first call returns 1
    pub fn allocate_next<S: KvStore>(store: &mut S) -> Result<u64> {
        let nonce = Self::last_nonce(store)? + 1;
        record::set_u64(store, &[LAST_OUTGOING_BATCH_NONCE_KEY], nonce);
        Ok(nonce)
    }

    /// Most recently allocated nonce, 0 before the first allocation
    pub fn last_nonce<S: KvStore>(store: &S) -> Result<u64> {
        record::get_u64(store, &[LAST_OUTGOING_BATCH_NONCE_KEY])
    }
}
