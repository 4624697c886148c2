//! Ledger monitor service and poll loop.
//!
//! This module defines `LedgerMonitor`, which polls a ledger node on an adaptive schedule,
//! keeps the generation-scoped `MonitorState` current, and answers on-demand lookups for the
//! host. The monitor is responsible for:
//! - Running one poll cycle at a time and scheduling the next one after it finishes
//! - Scanning for newly populated blocks while the node supports it
//! - Replacing all cached state when the node reports a new chain generation
//! - Publishing change notifications only when something observable changed
//! - Serving cached or retried block, transaction, and balance lookups

use crate::monitor::{
	AddressInfo, MonitorConfig, MonitorError,
	events::{ChangeNotifier, ChangeSubscription},
	retry::{RetryPolicy, with_retry},
	state::MonitorState,
};
use crate::rpc::{Block, BlockId, ContractParameter, LedgerNode, NeoRpcClient, Transaction};
use crate::utils::NeoAddress;

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Handle to a running monitor. Clones share the same poll loop and state.
#[derive(Clone)]
pub struct LedgerMonitor {
	inner: Arc<MonitorInner>,
}

struct MonitorInner {
	node: Arc<dyn LedgerNode>,
	config: MonitorConfig,
	state: Mutex<MonitorState>,
	notifier: ChangeNotifier,
	/// Cleared for good once the node reports the scan method as unsupported
	scan_enabled: AtomicBool,
	/// Set for good after the first successful scan
	scan_available: AtomicBool,
	/// Flips to true on disposal; also wakes the sleeping poll loop
	disposed: watch::Sender<bool>,
}

impl LedgerMonitor {
	/// Connect to the JSON-RPC node at `rpc_url` and start polling it.
	///
	/// Must be called from within a Tokio runtime.
	pub fn connect(rpc_url: &str, config: MonitorConfig) -> Result<Self, MonitorError> {
		let client = NeoRpcClient::new(rpc_url.to_string(), config.request_timeout)?;
		Ok(Self::start(Arc::new(client), config))
	}

	/// Start polling `node`. The first cycle runs as soon as the runtime schedules it.
	pub fn start(node: Arc<dyn LedgerNode>, config: MonitorConfig) -> Self {
		let monitor = Self::new(node, config);
		let weak = Arc::downgrade(&monitor.inner);
		let disposed = monitor.inner.disposed.subscribe();
		tokio::spawn(run_loop(weak, disposed));
		info!("Started monitoring {}", monitor.inner.node.url());
		monitor
	}

	fn new(node: Arc<dyn LedgerNode>, config: MonitorConfig) -> Self {
		let state = MonitorState::new(String::new(), &config, Instant::now());
		let (disposed, _) = watch::channel(false);
		Self {
			inner: Arc::new(MonitorInner {
				node,
				config,
				state: Mutex::new(state),
				notifier: ChangeNotifier::new(),
				scan_enabled: AtomicBool::new(true),
				scan_available: AtomicBool::new(false),
				disposed,
			}),
		}
	}

	/// The node this monitor polls
	pub fn url(&self) -> &str {
		self.inner.node.url()
	}

	/// Subscribe to change notifications carrying the latest known height
	pub fn subscribe(&self) -> ChangeSubscription {
		self.inner.notifier.subscribe()
	}

	/// Stop polling for good and end every change subscription.
	///
	/// A cycle already in flight finishes its network call but schedules nothing afterwards.
	pub fn dispose(&self) {
		if !self.inner.disposed.send_replace(true) {
			info!("Stopped monitoring {}", self.url());
		}
		self.inner.notifier.close();
	}

	pub fn is_disposed(&self) -> bool {
		*self.inner.disposed.borrow()
	}

	pub fn last_known_height(&self) -> u64 {
		self.inner.state.lock().last_known_height()
	}

	pub fn cache_generation(&self) -> String {
		self.inner.state.lock().cache_generation().to_string()
	}

	/// Interval the poll loop would wait right now
	pub fn current_refresh_interval(&self) -> Duration {
		self.inner.state.lock().current_refresh_interval()
	}

	/// Whether `height` may contain transactions.
	///
	/// Until population scanning has succeeded at least once every height is reported as
	/// populated, since absence cannot be asserted.
	pub fn is_block_populated(&self, height: u64) -> bool {
		!self.is_population_scan_available() || self.inner.state.lock().is_populated(height)
	}

	/// Whether population scanning has ever succeeded against this node
	pub fn is_population_scan_available(&self) -> bool {
		self.inner.scan_available.load(Ordering::SeqCst)
	}

	/// Look up a block by height or hash, serving it from cache when possible.
	///
	/// Blocks within one of the head are returned but not cached, as are blocks fetched while the
	/// chain generation changed.
	pub async fn get_block(&self, id: impl Into<BlockId>, retry: bool) -> Option<Block> {
		let id = id.into();
		if let Some(block) = self.inner.state.lock().find_block(&id) {
			return Some(block.clone());
		}

		let generation = self.cache_generation();
		let node = &self.inner.node;
		let block_id = &id;
		let block = with_retry(&format!("block {}", id), self.retry_policy(retry), move || {
			node.get_block(block_id)
		})
		.await?;

		let mut state = self.inner.state.lock();
		if state.cache_generation() == generation {
			state.cache_block(block.clone());
		} else {
			debug!("Chain generation changed while fetching block {}, not caching", id);
		}
		Some(block)
	}

	/// Look up a transaction by hash, serving it from cache when possible
	pub async fn get_transaction(&self, hash: &str, retry: bool) -> Option<Transaction> {
		if let Some(transaction) = self.inner.state.lock().find_transaction(hash) {
			return Some(transaction.clone());
		}

		let generation = self.cache_generation();
		let node = &self.inner.node;
		let transaction = with_retry(&format!("tx {}", hash), self.retry_policy(retry), move || {
			node.get_transaction(hash)
		})
		.await?;

		let mut state = self.inner.state.lock();
		if state.cache_generation() == generation {
			state.cache_transaction(transaction.clone());
		} else {
			debug!("Chain generation changed while fetching tx {}, not caching", hash);
		}
		Some(transaction)
	}

	/// Query the NEO and GAS balances of `address`. Never cached.
	pub async fn get_address(&self, address: &str, retry: bool) -> Option<AddressInfo> {
		let script_hash = match NeoAddress::decode(address) {
			Ok(decoded) => decoded.script_hash_hex(),
			Err(e) => {
				warn!("Cannot query balances of {}: {}", address, e);
				return None;
			}
		};

		let script_hash = script_hash.as_str();
		with_retry(&format!("address {}", address), self.retry_policy(retry), move || {
			self.fetch_balances(address, script_hash)
		})
		.await
	}

	async fn fetch_balances(
		&self,
		address: &str,
		script_hash: &str,
	) -> Result<AddressInfo, crate::rpc::RpcError> {
		let neo_balance = self
			.fetch_balance(&self.inner.config.neo_contract, script_hash)
			.await?;
		let gas_balance = self
			.fetch_balance(&self.inner.config.gas_contract, script_hash)
			.await?;
		Ok(AddressInfo {
			address: address.to_string(),
			neo_balance,
			gas_balance,
		})
	}

	async fn fetch_balance(
		&self,
		contract: &str,
		script_hash: &str,
	) -> Result<u128, crate::rpc::RpcError> {
		self.inner
			.node
			.invoke(
				contract,
				"balanceOf",
				vec![ContractParameter::hash160(script_hash)],
			)
			.await?
			.first_integer()
	}

	fn retry_policy(&self, retry: bool) -> RetryPolicy {
		if retry {
			RetryPolicy::new(self.inner.config.max_attempts, self.inner.config.retry_delay)
		} else {
			RetryPolicy::once()
		}
	}
}

/// Poll until the monitor is disposed or every handle to it has been dropped.
async fn run_loop(inner: Weak<MonitorInner>, mut disposed: watch::Receiver<bool>) {
	loop {
		let Some(monitor) = inner.upgrade().map(|inner| LedgerMonitor { inner }) else {
			break;
		};
		if monitor.is_disposed() {
			break;
		}

		match AssertUnwindSafe(monitor.inner.update_state())
			.catch_unwind()
			.await
		{
			Ok(Ok(())) => {}
			Ok(Err(e)) => error!("Unexpected error while monitoring {}: {}", monitor.url(), e),
			Err(panic) => {
				let e = MonitorError::CyclePanicked(panic_message(panic.as_ref()));
				error!("Unexpected error while monitoring {}: {}", monitor.url(), e);
			}
		}

		let interval = monitor.current_refresh_interval();
		debug!("Monitoring {} (interval: {:?})", monitor.url(), interval);
		drop(monitor);

		tokio::select! {
			_ = tokio::time::sleep(interval) => {}
			_ = disposed.changed() => {}
		}
	}
	debug!("Poll loop finished");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}

impl MonitorInner {
	/// One poll cycle: read the height, scan for populated blocks, publish if anything changed.
	async fn update_state(&self) -> Result<(), MonitorError> {
		let height = self.node.get_height().await?;
		let mut fire_change = height != self.state.lock().last_known_height();

		if self.scan_enabled.load(Ordering::SeqCst) {
			match self.scan_populated_blocks(height).await {
				Ok(changed) => fire_change |= changed,
				Err(e) if e.is_method_not_found() => {
					info!(
						"{} does not support populated block queries, disabling scans",
						self.node.url()
					);
					self.scan_enabled.store(false, Ordering::SeqCst);
				}
				Err(e) => return Err(e.into()),
			}
		}

		let mut state = self.state.lock();
		state.set_last_known_height(height);
		if fire_change {
			self.notifier.notify(height);
			state.record_update(Instant::now());
		}
		Ok(())
	}

	/// Walk backwards from `height` in batches until reaching the last known height.
	///
	/// Reported heights above `height` are ignored. Returns whether anything observable changed.
	async fn scan_populated_blocks(&self, height: u64) -> Result<bool, crate::rpc::RpcError> {
		let mut changed = false;
		let mut start = height;
		loop {
			let last_known = self.state.lock().last_known_height();
			let count = start
				.saturating_sub(last_known)
				.clamp(1, self.config.blocks_per_query.max(1));
			let result = self.node.get_populated_blocks(count, start).await?;

			if !self.scan_available.swap(true, Ordering::SeqCst) {
				changed = true;
			}

			let mut state = self.state.lock();
			if result.cache_id != state.cache_generation() {
				info!(
					"Chain generation changed ({:?} -> {:?}), clearing cache",
					state.cache_generation(),
					result.cache_id
				);
				*state = MonitorState::new(result.cache_id.clone(), &self.config, Instant::now());
				changed = true;
			}
			let mut lowest = None::<u64>;
			for &populated in &result.blocks {
				if populated > height {
					warn!(
						"{} reported populated block {} above height {}, ignoring",
						self.node.url(),
						populated,
						height
					);
					continue;
				}
				changed |= state.mark_populated(populated);
				lowest = Some(lowest.map_or(populated, |low| low.min(populated)));
			}

			let next = lowest.unwrap_or(0);
			if next >= start {
				break;
			}
			start = next;
			if start <= state.last_known_height() {
				break;
			}
		}
		Ok(changed)
	}
}
