//! Batch Registry Module
//!
//! This module provides a database registry of batch notifications.
//! Allows querying the history of a batch after its record left state.

mod database;
pub use database::{RecordedEvent, Registry};
