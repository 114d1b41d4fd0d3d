//! API Module
//!
//! This module handles the JSON-RPC API used by users, relayers and the oracle.
//! It provides the HTTP endpoint that clients use to reach the chain state.

mod server;


pub use server::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Server};
