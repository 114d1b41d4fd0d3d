//! State Management Module
//!
//! This module owns the committed module state and the home-chain height,
//! and serializes every transition through one lock.

mod chain;
pub use chain::{ChainState, Committed};
