//! Block Producer Module
//!
//! Drives the home chain in the node binary. Every average home block time it
//! advances the height, runs the per-block batch maintenance as one transition
//! and hands the emitted notifications to the registry.
//!
//! # Flow
//! 1. Wait for the next block tick
//! 2. Advance the height and cancel timed-out batches
//! 3. On creation heights, build a batch for every token with pending transfers
//! 4. Record the notifications in the registry

use crate::{registry::Registry, state::ChainState};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub struct BlockProducer {
    state: ChainState,
    registry: Option<Registry>,
    block_time: Duration,
}

impl BlockProducer {
    /// # Arguments
    /// * `state` - Shared chain state
    /// * `registry` - Where notifications are recorded, if anywhere
    pub fn new(state: ChainState, registry: Option<Registry>) -> Self {
        let block_time = Duration::from_millis(state.keeper().params().average_block_time_ms);
        Self {
            state,
            registry,
            block_time,
        }
    }

    /// Produce blocks until the task is dropped
    pub async fn start(self) -> anyhow::Result<()> {
        info!(
            "Block producer starting: block_time_ms={}, max_batch_size={}, batch_creation_period={}",
            self.block_time.as_millis(),
            self.state.keeper().params().max_batch_size,
            self.state.keeper().params().batch_creation_period
        );

        let mut ticker = interval(self.block_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.produce_block().await;
        }
    }

    /// Produce one block; failures are logged and the chain moves on
    pub async fn produce_block(&self) -> u64 {
        match self.state.advance_block().await {
            Ok((height, report, events)) => {
                if !report.created.is_empty() || !report.timed_out.is_empty() {
                    info!(
                        height,
                        created = ?report.created,
                        timed_out = ?report.timed_out,
                        "block produced"
                    );
                } else {
                    debug!(height, "block produced");
                }

                if let Some(registry) = &self.registry {
                    if let Err(e) = registry.store(height, &events).await {
                        warn!("Failed to record batch events at height {}: {:?}", height, e);
                    }
                }
                height
            }
            Err(e) => {
                let height = self.state.height().await;
                error!("Batch maintenance failed at height {}: {}", height, e);
                height
            }
        }
    }
}
