//! Batch Module
//!
//! This module handles outgoing batch creation and lifecycle:
//! - NonceAllocator: global batch nonce counter
//! - FeeEvaluator: fee totals over the unbatched pool
//! - TimeoutProjector: foreign-chain deadline from observed heights
//! - BatchBuilder: profitability-gated batch creation
//! - BatchLifecycleManager: execution, cancellation and slashing queries
//! - BatchKeeper: facade and per-block maintenance
//! - BlockProducer: drives blocks and maintenance in the node

mod builder;
mod fees;
mod keeper;
mod lifecycle;
mod nonce;
pub mod orchestrator;
pub mod timeout;

#[cfg(test)]
mod tests;

pub use builder::BatchBuilder;
pub use fees::FeeEvaluator;
pub use keeper::{BatchKeeper, EndBlockReport};
pub use lifecycle::BatchLifecycleManager;
pub use nonce::NonceAllocator;
pub use orchestrator::BlockProducer;
pub use timeout::TimeoutProjector;
