//! Ledger Monitor Module
//!
//! This module contains the background monitor that keeps a local view of a remote ledger node
//! up to date. It is composed of several submodules:
//!
//! - `service`: The `LedgerMonitor` itself: the adaptive poll loop and the on-demand lookups.
//! - `state`: The generation-scoped cache of blocks, transactions, and populated heights.
//! - `events`: Change notification publishing and per-consumer subscriptions.
//! - `retry`: The bounded, fixed-delay retry policy used by lookups.
//! - `pool`: Reference-counted sharing of one monitor per node address.
//! - `types`: Configuration, results, and error types.

/// Change notifications
pub mod events;
/// Monitors shared by node address
pub mod pool;
/// Retrying for on-demand lookups
pub mod retry;
/// The ledger monitor and its poll loop
pub mod service;
/// Generation-scoped cached state
pub mod state;
/// Configuration, results, and errors
pub mod types;

pub use events::ChangeSubscription;
pub use pool::{MonitorLease, MonitorPool, NodeConnector};
pub use service::LedgerMonitor;
pub use state::MonitorState;
pub use types::*;
