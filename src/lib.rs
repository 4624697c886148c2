//! Background monitor for Neo ledger nodes.
//!
//! A `LedgerMonitor` polls a node over JSON-RPC, adapts its cadence to the observed block rate,
//! caches recent blocks and transactions, tracks which heights hold transactions, and notifies
//! subscribers whenever its view of the chain changes. `MonitorPool` shares one monitor among
//! every consumer watching the same node.

pub mod monitor;
pub mod rpc;
pub mod utils;

pub use monitor::{
	AddressInfo, ChangeSubscription, LedgerMonitor, MonitorConfig, MonitorError, MonitorLease,
	MonitorPool,
};
pub use rpc::{Block, BlockId, LedgerNode, NeoRpcClient, RpcError, Transaction};
