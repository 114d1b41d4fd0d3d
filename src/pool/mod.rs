//! Transaction Pool Module
//!
//! This module manages the per-token pools of transfers waiting to be batched.
//! Transfers are ordered by fee (highest first) through their store key.

mod unbatched;


pub use unbatched::{PoolCursor, UnbatchedPool};
