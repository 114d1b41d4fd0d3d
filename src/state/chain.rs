use crate::{
    batch::{BatchKeeper, EndBlockReport},
    context::Context,
    error::BatchError,
    events::Event,
    store::{run_transition, CacheStore, MemStore},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Result of a committed transition
#[derive(Debug)]
pub struct Committed<T> {
    /// Height the transition ran at
    pub height: u64,
    pub value: T,
    pub events: Vec<Event>,
}

struct Chain {
    store: MemStore,
    height: u64,
}

/// Shared home-chain state
///
/// Block production and API requests all go through the same lock, so every
/// transition runs alone and in one global order.
#[derive(Clone)]
pub struct ChainState {
    chain: Arc<RwLock<Chain>>,
    keeper: Arc<BatchKeeper>,
}

impl ChainState {
    pub fn new(keeper: BatchKeeper) -> Self {
        Self {
            chain: Arc::new(RwLock::new(Chain {
                store: MemStore::new(),
                height: 0,
            })),
            keeper: Arc::new(keeper),
        }
    }

    pub fn keeper(&self) -> &BatchKeeper {
        &self.keeper
    }

    pub async fn height(&self) -> u64 {
        self.chain.read().await.height
    }

    /// Run `f` as one atomic transition at the current height
    ///
    /// Nothing is written if `f` fails.
    pub async fn transition<T, F>(&self, f: F) -> Result<Committed<T>, BatchError>
    where
        F: FnOnce(&BatchKeeper, &mut Context<CacheStore<'_, MemStore>>) -> Result<T, BatchError>,
    {
        let mut chain = self.chain.write().await;
        let height = chain.height;
        let keeper: &BatchKeeper = &self.keeper;
        match run_transition(&mut chain.store, height, |ctx| f(keeper, ctx)) {
            Ok((value, events)) => Ok(Committed { height, value, events }),
            Err(err) => {
                if err.is_invariant_violation() {
                    warn!(height, error = %err, "transition aborted on invariant violation");
                }
                Err(err)
            }
        }
    }

    /// Read committed state
    pub async fn query<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&BatchKeeper, &MemStore, u64) -> T,
    {
        let chain = self.chain.read().await;
        f(self.keeper.as_ref(), &chain.store, chain.height)
    }

    /// Move to the next home block and run its batch maintenance
    pub async fn advance_block(&self) -> Result<(u64, EndBlockReport, Vec<Event>), BatchError> {
        let mut chain = self.chain.write().await;
        chain.height += 1;
        let height = chain.height;
        let keeper: &BatchKeeper = &self.keeper;
        let (report, events) = run_transition(&mut chain.store, height, |ctx| keeper.end_block(ctx))?;
        Ok((height, report, events))
    }
}
