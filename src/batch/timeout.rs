//! Batch Timeout Projection
//!
//! Converts "target timeout in milliseconds" into a foreign-chain block height.
//! The two chains produce blocks at different, independent rates, so the
//! current foreign height is extrapolated from the last height pair the oracle
//! observed together, assuming both chains kept their average block times.

use crate::config::Params;
use crate::error::{BatchError, Result};
use crate::store::{keys::{display_key, LAST_OBSERVED_HEIGHTS_KEY}, KvStore};
use crate::types::ObservedHeights;

#[derive(Debug, Clone)]
pub struct TimeoutProjector {
    average_block_time_ms: u64,
    average_foreign_block_time_ms: u64,
    target_batch_timeout_ms: u64,
}

impl TimeoutProjector {
    pub fn new(params: &Params) -> Self {
        Self {
            average_block_time_ms: params.average_block_time_ms,
            average_foreign_block_time_ms: params.average_foreign_block_time_ms,
            target_batch_timeout_ms: params.target_batch_timeout_ms,
        }
    }

    /// Foreign-chain deadline for a batch created at `current_height`
    ///
    /// Returns 0 while no height pair has been observed.
    pub fn project_timeout<S: KvStore>(&self, store: &S, current_height: u64) -> Result<u64> {
        Ok(self.project(get_observed_heights(store)?, current_height))
    }

    /// Pure projection from an observed height pair
    pub fn project(&self, heights: ObservedHeights, current_height: u64) -> u64 {
        if !heights.is_observed() || self.average_foreign_block_time_ms == 0 {
            return 0;
        }

        let elapsed = current_height.saturating_sub(heights.home_height);
        let projected_millis = elapsed.saturating_mul(self.average_block_time_ms);
        let projected_foreign_height =
            heights.foreign_height.saturating_add(projected_millis / self.average_foreign_block_time_ms);
        let blocks_to_add = self.target_batch_timeout_ms / self.average_foreign_block_time_ms;

        projected_foreign_height.saturating_add(blocks_to_add)
    }
}

/// Last height pair recorded by the oracle, `(0, 0)` if none yet
pub fn get_observed_heights<S: KvStore>(store: &S) -> Result<ObservedHeights> {
    let key = [LAST_OBSERVED_HEIGHTS_KEY];
    let Some(bytes) = store.get(&key) else {
        return Ok(ObservedHeights::default());
    };
    let arr: [u8; 16] = bytes.as_slice().try_into().map_err(|_| BatchError::MalformedValue {
        key: display_key(&key),
        expected: 16,
        got: bytes.len(),
    })?;

    let mut home = [0u8; 8];
    let mut foreign = [0u8; 8];
    home.copy_from_slice(&arr[..8]);
    foreign.copy_from_slice(&arr[8..]);
    Ok(ObservedHeights {
        home_height: u64::from_be_bytes(home),
        foreign_height: u64::from_be_bytes(foreign),
    })
}

/// Oracle write path for the observed height pair
pub fn set_observed_heights<S: KvStore>(store: &mut S, heights: ObservedHeights) {
    let mut value = Vec::with_capacity(16);
    value.extend_from_slice(&heights.home_height.to_be_bytes());
    value.extend_from_slice(&heights.foreign_height.to_be_bytes());
    store.set(vec![LAST_OBSERVED_HEIGHTS_KEY], value);
}
