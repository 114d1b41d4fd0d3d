//! Batch Lifecycle Module
//!
//! Outstanding batches end in one of two ways, and the record is deleted in both:
//! - executed on the foreign chain: member transfers are final
//! - canceled: member transfers go back to the unbatched pool
//!
//! The foreign contract only executes strictly increasing nonces per token, so
//! executing a batch makes every older batch of the same token stale.

use crate::{
    batch::timeout::get_observed_heights,
    config::BridgeConfig,
    context::Context,
    error::{BatchError, Result},
    events::{
        Event, EventType, ATTRIBUTE_KEY_BRIDGE_CHAIN_ID, ATTRIBUTE_KEY_CONTRACT, ATTRIBUTE_KEY_MODULE,
        ATTRIBUTE_KEY_NONCE, ATTRIBUTE_KEY_OUTGOING_BATCH_ID, MODULE_NAME,
    },
    pool::UnbatchedPool,
    store::{
        keys::{self, BATCH_TX_PREFIX, LAST_SLASHED_BATCH_BLOCK_KEY},
        record, KvStore,
    },
    types::{BatchTx, StoredRecord},
};
use ethers::types::Address;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BatchLifecycleManager {
    bridge: BridgeConfig,
}

impl BatchLifecycleManager {
    pub fn new(bridge: BridgeConfig) -> Self {
        Self { bridge }
    }

    /// Highest-nonce outstanding batch of `token`
    pub fn get_current_batch<S: KvStore>(&self, store: &S, token: Address) -> Result<Option<BatchTx>> {
        store
            .last_before(&keys::batch_tx_token_prefix(token), None)
            .map(|(key, bytes)| record::decode_batch(&key, &bytes))
            .transpose()
    }

    pub fn get_batch<S: KvStore>(&self, store: &S, token: Address, nonce: u64) -> Result<Option<BatchTx>> {
        let key = keys::batch_tx_key(token, nonce);
        store
            .get(&key)
            .map(|bytes| record::decode_batch(&key, &bytes))
            .transpose()
    }

    /// Every outstanding batch, ordered by token then nonce
    pub fn outstanding_batches<S: KvStore>(&self, store: &S) -> Result<Vec<BatchTx>> {
        store
            .prefix_scan(&[BATCH_TX_PREFIX])
            .into_iter()
            .map(|(key, bytes)| record::decode_batch(&key, &bytes))
            .collect()
    }

    /// Persist a newly built batch and announce it
    pub fn store_batch<S: KvStore>(&self, ctx: &mut Context<S>, batch: &BatchTx) -> Result<()> {
        let key = keys::batch_tx_key(batch.token_contract, batch.nonce);
        let value = record::encode(&StoredRecord::Batch(batch.clone()))?;
        ctx.store_mut().set(key, value);
        ctx.emit(self.batch_event(EventType::OutgoingBatch, batch.nonce));
        Ok(())
    }

    /// Finalize a batch whose execution on the foreign chain was observed
    ///
    /// Older batches of the same token are canceled first. The executed
    /// batch's transfers are not returned to the pool.
    pub fn execute_batch<S: KvStore>(&self, ctx: &mut Context<S>, token: Address, nonce: u64) -> Result<BatchTx> {
        let Some(executed) = self.get_batch(ctx.store(), token, nonce)? else {
            return Err(BatchError::BatchNotFound { token, nonce });
        };

        let stale: Vec<u64> = ctx
            .store()
            .prefix_scan(&keys::batch_tx_token_prefix(token))
            .into_iter()
            .map(|(key, bytes)| record::decode_batch(&key, &bytes))
            .filter_map(|batch| match batch {
                Ok(batch) if batch.nonce < nonce => Some(Ok(batch.nonce)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<_>>()?;
        for stale_nonce in &stale {
            self.cancel_batch(ctx, token, *stale_nonce)?;
        }

        ctx.store_mut().delete(&keys::batch_tx_key(token, nonce));
        info!(
            nonce,
            token = ?token,
            transfers = executed.transactions.len(),
            canceled = stale.len(),
            "batch executed"
        );
        Ok(executed)
    }

    /// Return every member transfer to the pool and delete the batch
    pub fn cancel_batch<S: KvStore>(&self, ctx: &mut Context<S>, token: Address, nonce: u64) -> Result<BatchTx> {
        let Some(batch) = self.get_batch(ctx.store(), token, nonce)? else {
            return Err(BatchError::BatchNotFound { token, nonce });
        };

        for tx in &batch.transactions {
            UnbatchedPool::insert(ctx.store_mut(), tx)?;
        }
        ctx.store_mut().delete(&keys::batch_tx_key(token, nonce));
        ctx.emit(self.batch_event(EventType::OutgoingBatchCanceled, nonce));

        debug!(nonce, token = ?token, requeued = batch.transactions.len(), "batch canceled");
        Ok(batch)
    }

    /// Cancel every batch whose timeout lies below the last observed foreign height
    pub fn cancel_timed_out_batches<S: KvStore>(&self, ctx: &mut Context<S>) -> Result<Vec<BatchTx>> {
        let foreign_height = get_observed_heights(ctx.store())?.foreign_height;
        let timed_out: Vec<BatchTx> = self
            .outstanding_batches(ctx.store())?
            .into_iter()
            .filter(|batch| batch.timeout < foreign_height)
            .collect();

        let mut canceled = Vec::with_capacity(timed_out.len());
        for batch in timed_out {
            warn!(
                nonce = batch.nonce,
                timeout = batch.timeout,
                foreign_height,
                "batch timed out"
            );
            canceled.push(self.cancel_batch(ctx, batch.token_contract, batch.nonce)?);
        }
        Ok(canceled)
    }

    /// Outstanding batches created strictly between the slash watermark and `max_height`
    pub fn get_slash_candidates<S: KvStore>(&self, store: &S, max_height: u64) -> Result<Vec<BatchTx>> {
        let watermark = self.get_slash_watermark(store)?;
        Ok(self
            .outstanding_batches(store)?
            .into_iter()
            .filter(|batch| batch.height > watermark && batch.height < max_height)
            .collect())
    }

    pub fn get_slash_watermark<S: KvStore>(&self, store: &S) -> Result<u64> {
        record::get_u64(store, &[LAST_SLASHED_BATCH_BLOCK_KEY])
    }

    /// Callers are responsible for only moving the watermark forward
    pub fn set_slash_watermark<S: KvStore>(&self, store: &mut S, height: u64) {
        record::set_u64(store, &[LAST_SLASHED_BATCH_BLOCK_KEY], height);
    }

    fn batch_event(&self, kind: EventType, nonce: u64) -> Event {
        Event::new(kind)
            .with_attribute(ATTRIBUTE_KEY_MODULE, MODULE_NAME)
            .with_attribute(ATTRIBUTE_KEY_CONTRACT, format!("{:?}", self.bridge.contract_address))
            .with_attribute(ATTRIBUTE_KEY_BRIDGE_CHAIN_ID, self.bridge.chain_id)
            .with_attribute(ATTRIBUTE_KEY_OUTGOING_BATCH_ID, nonce)
            .with_attribute(ATTRIBUTE_KEY_NONCE, nonce)
    }
}
