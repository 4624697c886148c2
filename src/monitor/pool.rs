//! Shared monitors keyed by node address.
//!
//! Every consumer interested in the same node joins the pool and receives a `MonitorLease`.
//! Leases share one `LedgerMonitor` and one node connection. Dropping a lease only detaches its
//! own change subscription and decrements the share count; the monitor is disposed when the last
//! lease for its address goes away.

use crate::monitor::{LedgerMonitor, MonitorConfig, MonitorError, events::ChangeSubscription};
use crate::rpc::{LedgerNode, NeoRpcClient};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, info};

/// Opens the node connection for a new pooled monitor.
pub type NodeConnector =
	Arc<dyn Fn(&str, &MonitorConfig) -> Result<Arc<dyn LedgerNode>, MonitorError> + Send + Sync>;

struct PoolEntry {
	monitor: LedgerMonitor,
	leases: usize,
}

/// Reference-counted set of running monitors
#[derive(Clone)]
pub struct MonitorPool {
	config: MonitorConfig,
	connector: NodeConnector,
	entries: Arc<Mutex<HashMap<String, PoolEntry>>>,
}

impl MonitorPool {
	/// Pool whose monitors talk JSON-RPC over HTTP
	pub fn new(config: MonitorConfig) -> Self {
		Self::with_connector(
			config,
			Arc::new(
				|url: &str, config: &MonitorConfig| -> Result<Arc<dyn LedgerNode>, MonitorError> {
					let client = NeoRpcClient::new(url.to_string(), config.request_timeout)?;
					Ok(Arc::new(client) as Arc<dyn LedgerNode>)
				},
			),
		)
	}

	pub fn with_connector(config: MonitorConfig, connector: NodeConnector) -> Self {
		Self {
			config,
			connector,
			entries: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Join the monitor for `url`, starting one if nobody is watching that node yet.
	///
	/// Must be called from within a Tokio runtime.
	pub fn join(&self, url: &str) -> Result<MonitorLease, MonitorError> {
		let mut entries = self.entries.lock();
		let entry = match entries.entry(url.to_string()) {
			Entry::Occupied(occupied) if !occupied.get().monitor.is_disposed() => {
				occupied.into_mut()
			}
			Entry::Occupied(occupied) => {
				// Disposed directly through a lease; outstanding leases keep their count.
				info!("Monitor for {} was disposed, starting a new one", url);
				let monitor = self.start_monitor(url)?;
				let entry = occupied.into_mut();
				entry.monitor = monitor;
				entry
			}
			Entry::Vacant(vacant) => {
				let monitor = self.start_monitor(url)?;
				vacant.insert(PoolEntry { monitor, leases: 0 })
			}
		};
		entry.leases += 1;
		debug!("Joined monitor for {} ({} leases)", url, entry.leases);

		let monitor = entry.monitor.clone();
		let subscription = monitor.subscribe();
		Ok(MonitorLease {
			pool: self.clone(),
			url: url.to_string(),
			monitor,
			subscription,
		})
	}

	fn start_monitor(&self, url: &str) -> Result<LedgerMonitor, MonitorError> {
		let node = (self.connector)(url, &self.config)?;
		Ok(LedgerMonitor::start(node, self.config.clone()))
	}

	/// Number of node addresses currently monitored
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Current share count for `url`
	pub fn lease_count(&self, url: &str) -> usize {
		self.entries
			.lock()
			.get(url)
			.map(|entry| entry.leases)
			.unwrap_or(0)
	}

	fn release(&self, url: &str) {
		let released = {
			let mut entries = self.entries.lock();
			let Some(entry) = entries.get_mut(url) else {
				return;
			};
			entry.leases = entry.leases.saturating_sub(1);
			if entry.leases > 0 {
				debug!("Left monitor for {} ({} leases)", url, entry.leases);
				return;
			}
			entries.remove(url).map(|entry| entry.monitor)
		};

		if let Some(monitor) = released {
			info!("Last lease for {} released", url);
			monitor.dispose();
		}
	}
}

/// One consumer's share of a pooled monitor.
///
/// Dropping the lease is the pooled disposal.
pub struct MonitorLease {
	pool: MonitorPool,
	url: String,
	monitor: LedgerMonitor,
	subscription: ChangeSubscription,
}

impl MonitorLease {
	pub fn monitor(&self) -> &LedgerMonitor {
		&self.monitor
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// This lease's change notifications
	pub fn changes(&mut self) -> &mut ChangeSubscription {
		&mut self.subscription
	}

	/// Give up this share of the monitor
	pub fn dispose(self) {
		drop(self);
	}
}

impl Drop for MonitorLease {
	fn drop(&mut self) {
		self.pool.release(&self.url);
	}
}
