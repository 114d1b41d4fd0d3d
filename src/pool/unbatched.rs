//! Unbatched Pool Module
//!
//! Pending transfers waiting to be included in a batch, persisted per token
//! contract. The key encoding makes the priority order explicit: descending
//! key order is highest fee first, oldest first among equal fees.

use crate::{
    context::Context,
    error::{BatchError, Result},
    store::{
        keys::{self, BATCH_TX_PREFIX, LAST_TRANSFER_ID_KEY, UNBATCHED_TRANSFER_PREFIX},
        record, KvStore,
    },
    types::{Erc20Token, SendToForeign, StoredRecord},
};
use ethers::types::Address;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Descending walk over the pool of one token
///
/// Each step asks the store for the entry just below the previous position, so
/// the caller may delete the entry it was handed before taking the next step.
pub struct PoolCursor {
    prefix: Vec<u8>,
    position: Option<Vec<u8>>,
}

impl PoolCursor {
    pub fn new(token: Address) -> Self {
        Self {
            prefix: keys::unbatched_token_prefix(token),
            position: None,
        }
    }

    /// Advance to the next transfer in priority order, returning its key too
    pub fn step<S: KvStore>(&mut self, store: &S) -> Result<Option<(Vec<u8>, SendToForeign)>> {
        let Some((key, bytes)) = store.last_before(&self.prefix, self.position.as_deref()) else {
            return Ok(None);
        };
        let transfer = record::decode_transfer(&key, &bytes)?;
        self.position = Some(key.clone());
        Ok(Some((key, transfer)))
    }
}

/// Access to the per-token pools of unbatched transfers
pub struct UnbatchedPool;

impl UnbatchedPool {
    /// Create a new transfer and put it in the pool of its token
    ///
    /// The fee must be paid in the token being transferred.
    pub fn add_transfer<S: KvStore>(
        ctx: &mut Context<S>,
        sender: String,
        foreign_recipient: Address,
        amount: Erc20Token,
        fee: Erc20Token,
    ) -> Result<SendToForeign> {
        if amount.contract != fee.contract {
            return Err(BatchError::MismatchedFeeToken {
                amount: amount.contract,
                fee: fee.contract,
            });
        }

        let id = record::get_u64(ctx.store(), &[LAST_TRANSFER_ID_KEY])? + 1;
        record::set_u64(ctx.store_mut(), &[LAST_TRANSFER_ID_KEY], id);

        let transfer = SendToForeign {
            id,
            sender,
            foreign_recipient,
            amount,
            fee,
            height: ctx.block_height(),
        };
        Self::insert(ctx.store_mut(), &transfer)?;

        info!(
            id,
            token = ?transfer.amount.contract,
            fee = %transfer.fee.amount,
            "transfer added to unbatched pool"
        );
        Ok(transfer)
    }

    /// Index a transfer by its fee; also used to requeue transfers of canceled batches
    pub fn insert<S: KvStore>(store: &mut S, transfer: &SendToForeign) -> Result<()> {
        let key = keys::unbatched_transfer_key(transfer.amount.contract, transfer.fee.amount, transfer.id);
        let value = record::encode(&StoredRecord::Transfer(transfer.clone()))?;
        store.set(key, value);
        Ok(())
    }

    pub fn remove<S: KvStore>(store: &mut S, transfer: &SendToForeign) {
        store.delete(&keys::unbatched_transfer_key(
            transfer.amount.contract,
            transfer.fee.amount,
            transfer.id,
        ));
    }

    /// Visit the pool of `token` in priority order until `visit` returns `true`
    pub fn iterate_by_contract<S, F>(store: &S, token: Address, mut visit: F) -> Result<()>
    where
        S: KvStore,
        F: FnMut(&SendToForeign) -> bool,
    {
        let mut cursor = PoolCursor::new(token);
        while let Some((_, transfer)) = cursor.step(store)? {
            if visit(&transfer) {
                break;
            }
        }
        Ok(())
    }

    /// Remove and return up to `limit` transfers of `token` in priority order
    ///
    /// Each transfer leaves the pool in the same step that selects it.
    pub fn take_by_contract<S: KvStore>(store: &mut S, token: Address, limit: usize) -> Result<Vec<SendToForeign>> {
        let mut selected = Vec::new();
        let mut cursor = PoolCursor::new(token);
        while selected.len() < limit {
            let Some((key, transfer)) = cursor.step(&*store)? else {
                break;
            };
            store.delete(&key);
            selected.push(transfer);
        }
        Ok(selected)
    }

    /// Every transfer pending for `token`, in priority order
    pub fn transfers<S: KvStore>(store: &S, token: Address) -> Result<Vec<SendToForeign>> {
        let mut out = Vec::new();
        Self::iterate_by_contract(store, token, |tx| {
            out.push(tx.clone());
            false
        })?;
        Ok(out)
    }

    /// Token contracts with at least one pending transfer, ascending
    pub fn tokens<S: KvStore>(store: &S) -> Vec<Address> {
        store
            .prefix_scan(&[UNBATCHED_TRANSFER_PREFIX])
            .iter()
            .filter_map(|(key, _)| keys::token_from_key(key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Withdraw a transfer that has not been batched yet
    ///
    /// Returns the removed transfer so the caller can refund amount and fee.
    pub fn cancel_transfer<S: KvStore>(ctx: &mut Context<S>, id: u64, sender: &str) -> Result<SendToForeign> {
        let found = ctx
            .store()
            .prefix_scan(&[UNBATCHED_TRANSFER_PREFIX])
            .into_iter()
            .map(|(key, bytes)| record::decode_transfer(&key, &bytes))
            .find(|decoded| matches!(decoded, Ok(tx) if tx.id == id) || decoded.is_err())
            .transpose()?;

        let Some(transfer) = found else {
            return Err(Self::locate_batched(ctx.store(), id)?);
        };
        if transfer.sender != sender {
            return Err(BatchError::NotSender {
                id,
                sender: sender.to_string(),
            });
        }

        Self::remove(ctx.store_mut(), &transfer);
        debug!(id, sender, "unbatched transfer canceled");
        Ok(transfer)
    }

    /// Error describing why transfer `id` is not in the pool
    fn locate_batched<S: KvStore>(store: &S, id: u64) -> Result<BatchError> {
        for (key, bytes) in store.prefix_scan(&[BATCH_TX_PREFIX]) {
            let batch = record::decode_batch(&key, &bytes)?;
            if batch.transactions.iter().any(|tx| tx.id == id) {
                return Ok(BatchError::TransferInBatch { id, nonce: batch.nonce });
            }
        }
        Ok(BatchError::TransferNotFound(id))
    }
}
