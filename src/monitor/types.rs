use crate::rpc::RpcError;
use crate::utils::AddressError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// NEO native asset contract.
pub const NEO_CONTRACT: &str = "0x0a46e2e37c9987f570b4af253fb77e7eef0f72b6";
/// GAS native asset contract.
pub const GAS_CONTRACT: &str = "0xa6a6c15dcdc9b997dac448b6926522d22efeedfb";

/// Tunables for a ledger monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
	/// Maximum number of cached blocks
	pub block_cache_size: usize,
	/// Maximum number of cached transactions
	pub transaction_cache_size: usize,
	/// Upper bound on heights requested per populated-blocks call
	pub blocks_per_query: u64,
	/// Fastest polling cadence, also used before any update has been observed
	pub min_refresh_interval: Duration,
	/// Slowest polling cadence
	pub max_refresh_interval: Duration,
	/// Fraction of the mean observed update gap used as the polling interval
	pub refresh_damping: f64,
	/// Number of recent update timestamps kept for cadence estimation
	pub speed_detection_window: usize,
	/// Attempts per lookup when retrying is enabled
	pub max_attempts: u32,
	/// Fixed pause between lookup attempts
	pub retry_delay: Duration,
	/// Per-request timeout for the HTTP client
	pub request_timeout: Option<Duration>,
	/// Contract queried for the NEO balance
	pub neo_contract: String,
	/// Contract queried for the GAS balance
	pub gas_contract: String,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			block_cache_size: 1024,
			transaction_cache_size: 1024,
			blocks_per_query: 100,
			min_refresh_interval: Duration::from_millis(1000),
			max_refresh_interval: Duration::from_millis(30_000),
			refresh_damping: 1.0 / 3.0,
			speed_detection_window: 10,
			max_attempts: 3,
			retry_delay: Duration::from_millis(500),
			request_timeout: None,
			neo_contract: NEO_CONTRACT.to_string(),
			gas_contract: GAS_CONTRACT.to_string(),
		}
	}
}

/// Balances of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
	pub address: String,
	pub neo_balance: u128,
	pub gas_balance: u128,
}

/// Error types for monitor construction and poll cycles
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
	#[error("RPC error: {0}")]
	RpcError(#[from] RpcError),

	#[error("Address error: {0}")]
	AddressError(#[from] AddressError),

	#[error("Poll cycle panicked: {0}")]
	CyclePanicked(String),
}
