//! Ledger node integration module
//!
//! This module provides the client and types for talking to a Neo ledger node over JSON-RPC.
//! The monitor only depends on the `LedgerNode` trait, so hosts and tests can plug in any
//! node implementation.

/// JSON-RPC client and the `LedgerNode` trait
mod client;
/// Scripted in-memory node for tests
#[cfg(test)]
pub(crate) mod mock;
/// Type definitions for node data structures
mod types;

pub use client::{LedgerNode, NeoRpcClient};
pub use types::*;
