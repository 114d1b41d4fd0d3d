use crate::{
    batch::{
        builder::BatchBuilder,
        fees::FeeEvaluator,
        lifecycle::BatchLifecycleManager,
        timeout::{self, TimeoutProjector},
    },
    config::{BridgeConfig, Params},
    context::Context,
    error::Result,
    pool::UnbatchedPool,
    store::KvStore,
    types::{BatchTx, ObservedHeights},
};
use ethers::types::{Address, U256};
use tracing::debug;

/// Outcome of the per-block batch maintenance
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndBlockReport {
    /// Nonces of batches canceled because their timeout passed
    pub timed_out: Vec<u64>,
    /// Nonces of batches created this block
    pub created: Vec<u64>,
}

/// Entry point bundling the batch components with the module parameters
#[derive(Debug, Clone)]
pub struct BatchKeeper {
    params: Params,
    projector: TimeoutProjector,
    lifecycle: BatchLifecycleManager,
}

impl BatchKeeper {
    pub fn new(params: Params, bridge: BridgeConfig) -> Self {
        Self {
            projector: TimeoutProjector::new(&params),
            lifecycle: BatchLifecycleManager::new(bridge),
            params,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn projector(&self) -> &TimeoutProjector {
        &self.projector
    }

    pub fn lifecycle(&self) -> &BatchLifecycleManager {
        &self.lifecycle
    }

    pub fn builder(&self) -> BatchBuilder<'_> {
        BatchBuilder::new(&self.projector, &self.lifecycle)
    }

    pub fn build_batch<S: KvStore>(
        &self,
        ctx: &mut Context<S>,
        token: Address,
        max_elements: usize,
    ) -> Result<Option<BatchTx>> {
        self.builder().build_batch(ctx, token, max_elements)
    }

    /// Fee total a batch of `token` built now with the configured size would carry
    pub fn batch_fees<S: KvStore>(&self, store: &S, token: Address) -> Result<U256> {
        FeeEvaluator::aggregate_fees(store, token, self.params.max_batch_size)
    }

    pub fn all_batch_fees<S: KvStore>(&self, store: &S) -> Result<Vec<(Address, U256)>> {
        FeeEvaluator::all_batch_fees(store, self.params.max_batch_size)
    }

    /// Oracle hook recording a jointly observed height pair
    pub fn set_observed_heights<S: KvStore>(&self, ctx: &mut Context<S>, foreign_height: u64) {
        let heights = ObservedHeights {
            home_height: ctx.block_height(),
            foreign_height,
        };
        timeout::set_observed_heights(ctx.store_mut(), heights);
    }

    /// Per-block maintenance
    ///
    /// Cancels timed-out batches, then every `batch_creation_period` blocks
    /// builds a batch for each token with pending transfers, lowest address first.
    pub fn end_block<S: KvStore>(&self, ctx: &mut Context<S>) -> Result<EndBlockReport> {
        let mut report = EndBlockReport {
            timed_out: self
                .lifecycle
                .cancel_timed_out_batches(ctx)?
                .iter()
                .map(|batch| batch.nonce)
                .collect(),
            created: Vec::new(),
        };

        // A zero period disables periodic creation.
        if ctx.block_height().checked_rem(self.params.batch_creation_period) != Some(0) {
            return Ok(report);
        }

        for token in UnbatchedPool::tokens(ctx.store()) {
            if let Some(batch) = self.build_batch(ctx, token, self.params.max_batch_size)? {
                report.created.push(batch.nonce);
            }
        }
        debug!(
            height = ctx.block_height(),
            created = report.created.len(),
            timed_out = report.timed_out.len(),
            "end block batch maintenance"
        );
        Ok(report)
    }
}
