use crate::error::Result;
use crate::pool::UnbatchedPool;
use crate::store::KvStore;
use ethers::types::{Address, U256};

/// Read-only fee totals over the unbatched pool
///
/// Walks the pool in the same order and with the same prefix length as batch
/// selection, so the total is exactly the fee a batch built now would carry.
pub struct FeeEvaluator;

impl FeeEvaluator {
    /// Sum of the fees of the first `limit` pending transfers of `token`
    pub fn aggregate_fees<S: KvStore>(store: &S, token: Address, limit: usize) -> Result<U256> {
        let mut total = U256::zero();
        if limit == 0 {
            return Ok(total);
        }

        let mut visited = 0;
        UnbatchedPool::iterate_by_contract(store, token, |tx| {
            total = total.saturating_add(tx.fee.amount);
            visited += 1;
            visited == limit
        })?;
        Ok(total)
    }

    /// Fee total of the next batch for every token with pending transfers
    pub fn all_batch_fees<S: KvStore>(store: &S, limit: usize) -> Result<Vec<(Address, U256)>> {
        UnbatchedPool::tokens(store)
            .into_iter()
            .map(|token| Ok((token, Self::aggregate_fees(store, token, limit)?)))
            .collect()
    }
}
