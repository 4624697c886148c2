//!
//! JSON-RPC client for a Neo ledger node.
//!
//! This module defines the `LedgerNode` trait, the interface the monitor polls and queries, and
//! `NeoRpcClient`, its JSON-RPC 2.0 over HTTP implementation. Every request carries a locally
//! incrementing id. All methods are async and designed for use with Tokio.

use super::types::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Queries the monitor issues against a remote ledger node.
#[async_trait::async_trait]
pub trait LedgerNode: Send + Sync {
	/// Current chain height (the node's block count).
	async fn get_height(&self) -> Result<u64, RpcError>;

	/// Full-detail block by height or hash.
	async fn get_block(&self, id: &BlockId) -> Result<Block, RpcError>;

	/// Full-detail transaction by hash.
	async fn get_transaction(&self, hash: &str) -> Result<Transaction, RpcError>;

	/// Up to `count` populated block heights at or below `end_height`, highest first.
	///
	/// Fails with `RpcError::MethodNotFound` on nodes without the extension.
	async fn get_populated_blocks(
		&self,
		count: u64,
		end_height: u64,
	) -> Result<PopulatedBlocks, RpcError>;

	/// Test-invoke a contract method without submitting a transaction.
	async fn invoke(
		&self,
		contract: &str,
		method: &str,
		args: Vec<ContractParameter>,
	) -> Result<InvokeResult, RpcError>;

	/// The address of the node, used for logging.
	fn url(&self) -> &str;
}

/// Neo JSON-RPC client
pub struct NeoRpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The JSON-RPC endpoint of the node.
	rpc_url: String,
	/// Id of the next request.
	next_id: AtomicU64,
}

impl NeoRpcClient {
	/// Create a new client for the node at `rpc_url`.
	///
	/// # Arguments
	/// * `rpc_url` - The JSON-RPC HTTP endpoint.
	/// * `timeout` - Optional per-request timeout. Without one a hung request stalls its caller.
	pub fn new(rpc_url: String, timeout: Option<Duration>) -> Result<Self, RpcError> {
		let mut builder = Client::builder();
		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}
		let http_client = builder.build()?;

		Ok(Self {
			http_client,
			rpc_url,
			next_id: AtomicU64::new(0),
		})
	}

	/// Execute one JSON-RPC call and decode its `result`.
	///
	/// # Returns
	/// The decoded result, `RpcError::MethodNotFound` if the node does not know `method`, or
	/// another `RpcError` if the request or response is unusable.
	pub async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: Value,
	) -> Result<T, RpcError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});
		debug!("RPC request {} -> {} ({})", id, method, self.rpc_url);

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		let status = response.status();
		let bytes = response.bytes().await?;

		// Nodes may pair an error status with a JSON-RPC error body, so the body wins when it parses.
		let envelope: RpcResponse<T> = match serde_json::from_slice(&bytes) {
			Ok(envelope) => envelope,
			Err(_) if !status.is_success() => return Err(RpcError::StatusError(status.as_u16())),
			Err(e) => return Err(RpcError::JsonError(e)),
		};

		if let Some(error) = envelope.error {
			return Err(RpcError::from_remote(method, error));
		}
		if !status.is_success() {
			return Err(RpcError::StatusError(status.as_u16()));
		}

		envelope.result.ok_or(RpcError::NoData)
	}
}

#[async_trait::async_trait]
impl LedgerNode for NeoRpcClient {
	async fn get_height(&self) -> Result<u64, RpcError> {
		self.call("getblockcount", json!([])).await
	}

	async fn get_block(&self, id: &BlockId) -> Result<Block, RpcError> {
		self.call("getblock", json!([id.to_param(), true])).await
	}

	async fn get_transaction(&self, hash: &str) -> Result<Transaction, RpcError> {
		self.call("getrawtransaction", json!([hash, true])).await
	}

	async fn get_populated_blocks(
		&self,
		count: u64,
		end_height: u64,
	) -> Result<PopulatedBlocks, RpcError> {
		self.call("expressgetpopulatedblocks", json!([count, end_height]))
			.await
	}

	async fn invoke(
		&self,
		contract: &str,
		method: &str,
		args: Vec<ContractParameter>,
	) -> Result<InvokeResult, RpcError> {
		self.call("invokefunction", json!([contract, method, args]))
			.await
	}

	fn url(&self) -> &str {
		&self.rpc_url
	}
}
