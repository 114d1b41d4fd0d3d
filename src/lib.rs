//! This crate implements the outgoing-batch side of a two-chain bridge.
//! Pending withdrawals on the home chain are grouped into nonce-ordered batches
//! for execution on the foreign chain, and the batches are tracked until they
//! execute, get canceled or time out.

pub mod types; // Transfers, batches and stored record variants.
pub mod error; // Error type shared by every module operation.
pub mod events; // Notifications emitted by transitions.
pub mod context; // Per-transition context: store, height, events.
pub mod store; // Ordered key-value store, key layout and transition boundary.
pub mod pool; // Per-token pools of unbatched transfers.
pub mod batch; // Batch building, lifecycle and block production.
pub mod state; // Shared chain state used by the node.
pub mod registry; // SQL registry of emitted notifications.
pub mod api; // JSON-RPC endpoint.
pub mod config; // Defines and loads system configuration.

// Re-export commonly used types and configurations for easier access.
pub use types::*;
pub use config::Config;
pub use error::BatchError;
pub use batch::BatchKeeper;
