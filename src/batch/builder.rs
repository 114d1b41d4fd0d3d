//! Batch Builder Module
//!
//! Creates outgoing batches from the unbatched pool.
//!
//! # Flow
//! 1. Profitability guard: keep the current batch if it pays at least as much
//!    as a new one would
//! 2. Drain up to `max_elements` transfers from the pool, highest fee first
//! 3. Stamp nonce, foreign timeout and home height
//! 4. Persist and announce the batch

use crate::{
    batch::{
        fees::FeeEvaluator, lifecycle::BatchLifecycleManager, nonce::NonceAllocator,
        timeout::TimeoutProjector,
    },
    context::Context,
    error::Result,
    pool::UnbatchedPool,
    store::KvStore,
    types::BatchTx,
};
use ethers::types::Address;
use tracing::{debug, info};

pub struct BatchBuilder<'a> {
    projector: &'a TimeoutProjector,
    lifecycle: &'a BatchLifecycleManager,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(projector: &'a TimeoutProjector, lifecycle: &'a BatchLifecycleManager) -> Self {
        Self { projector, lifecycle }
    }

    /// Build a batch for `token` with at most `max_elements` transfers
    ///
    /// # Returns
    /// * `Ok(None)` if the current batch of `token` is at least as profitable
    /// * `Ok(Some(batch))` otherwise; the batch may be empty if the pool is
    pub fn build_batch<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        token: Address,
        max_elements: usize,
    ) -> Result<Option<BatchTx>> {
        if let Some(current) = self.lifecycle.get_current_batch(ctx.store(), token)? {
            let candidate_fees = FeeEvaluator::aggregate_fees(ctx.store(), token, max_elements)?;
            if current.fee_total() >= candidate_fees {
                debug!(
                    token = ?token,
                    current_nonce = current.nonce,
                    current_fees = %current.fee_total(),
                    candidate_fees = %candidate_fees,
                    "current batch is at least as profitable, not building"
                );
                return Ok(None);
            }
        }

        let transactions = UnbatchedPool::take_by_contract(ctx.store_mut(), token, max_elements)?;

        let height = ctx.block_height();
        let batch = BatchTx {
            nonce: NonceAllocator::allocate_next(ctx.store_mut())?,
            token_contract: token,
            transactions,
            timeout: self.projector.project_timeout(ctx.store(), height)?,
            height,
        };
        self.lifecycle.store_batch(ctx, &batch)?;

        info!(
            nonce = batch.nonce,
            token = ?token,
            transfers = batch.transactions.len(),
            fees = %batch.fee_total(),
            timeout = batch.timeout,
            "batch created"
        );
        Ok(Some(batch))
    }
}
