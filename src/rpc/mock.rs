use super::client::LedgerNode;
use super::types::*;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

/// In-memory `LedgerNode` whose answers are scripted by the test.
pub(crate) struct MockNode {
	inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
	height: u64,
	/// `None` makes the populated-blocks call fail with method-not-found.
	populated: Option<BTreeSet<u64>>,
	cache_id: String,
	/// Cache id adopted once the given number of further scans have been answered.
	next_cache_id: Option<(usize, String)>,
	/// Heights appended to every populated-blocks answer regardless of range.
	stray_populated: Vec<u64>,
	blocks: HashMap<u64, Block>,
	transactions: HashMap<String, Transaction>,
	balances: HashMap<(String, String), String>,
	/// Number of upcoming lookup calls that fail before the node answers again.
	lookup_failures: u32,
	/// Number of upcoming height calls that fail.
	height_failures: u32,
	/// Number of upcoming populated-blocks calls that fail with a transport error.
	scan_failures: u32,
	calls: HashMap<&'static str, usize>,
}

impl MockNode {
	pub(crate) fn new(height: u64) -> Self {
		Self {
			inner: Mutex::new(MockInner {
				height,
				..Default::default()
			}),
		}
	}

	pub(crate) fn set_height(&self, height: u64) {
		self.inner.lock().height = height;
	}

	pub(crate) fn set_populated(&self, heights: &[u64], cache_id: &str) {
		let mut inner = self.inner.lock();
		inner.populated = Some(heights.iter().copied().collect());
		inner.cache_id = cache_id.to_string();
	}

	/// Switch to `cache_id` after `scans` more populated-blocks answers
	pub(crate) fn switch_cache_id_after(&self, scans: usize, cache_id: &str) {
		self.inner.lock().next_cache_id = Some((scans, cache_id.to_string()));
	}

	pub(crate) fn report_stray_populated(&self, heights: &[u64]) {
		self.inner.lock().stray_populated = heights.to_vec();
	}

	pub(crate) fn add_block(&self, block: Block) {
		self.inner.lock().blocks.insert(block.index, block);
	}

	pub(crate) fn add_transaction(&self, transaction: Transaction) {
		self.inner
			.lock()
			.transactions
			.insert(transaction.hash.clone(), transaction);
	}

	pub(crate) fn set_balance(&self, contract: &str, script_hash: &str, amount: &str) {
		self.inner.lock().balances.insert(
			(contract.to_string(), script_hash.to_string()),
			amount.to_string(),
		);
	}

	pub(crate) fn fail_next_lookups(&self, count: u32) {
		self.inner.lock().lookup_failures = count;
	}

	pub(crate) fn fail_next_heights(&self, count: u32) {
		self.inner.lock().height_failures = count;
	}

	pub(crate) fn fail_next_scans(&self, count: u32) {
		self.inner.lock().scan_failures = count;
	}

	pub(crate) fn calls(&self, method: &str) -> usize {
		self.inner.lock().calls.get(method).copied().unwrap_or(0)
	}

	fn record(inner: &mut MockInner, method: &'static str) {
		*inner.calls.entry(method).or_default() += 1;
	}

	fn take_lookup_failure(inner: &mut MockInner) -> Result<(), RpcError> {
		if inner.lookup_failures > 0 {
			inner.lookup_failures -= 1;
			return Err(RpcError::StatusError(502));
		}
		Ok(())
	}
}

pub(crate) fn block(index: u64) -> Block {
	serde_json::from_value(serde_json::json!({
		"hash": format!("0xblock{}", index),
		"index": index,
	}))
	.expect("mock block")
}

pub(crate) fn transaction(hash: &str) -> Transaction {
	serde_json::from_value(serde_json::json!({ "hash": hash })).expect("mock transaction")
}

#[async_trait::async_trait]
impl LedgerNode for MockNode {
	async fn get_height(&self) -> Result<u64, RpcError> {
		let mut inner = self.inner.lock();
		Self::record(&mut inner, "getblockcount");
		if inner.height_failures > 0 {
			inner.height_failures -= 1;
			return Err(RpcError::StatusError(502));
		}
		Ok(inner.height)
	}

	async fn get_block(&self, id: &BlockId) -> Result<Block, RpcError> {
		let mut inner = self.inner.lock();
		Self::record(&mut inner, "getblock");
		Self::take_lookup_failure(&mut inner)?;
		inner
			.blocks
			.values()
			.find(|block| id.matches(block))
			.cloned()
			.ok_or_else(|| RpcError::RemoteError {
				code: -100,
				message: "Unknown block".to_string(),
			})
	}

	async fn get_transaction(&self, hash: &str) -> Result<Transaction, RpcError> {
		let mut inner = self.inner.lock();
		Self::record(&mut inner, "getrawtransaction");
		Self::take_lookup_failure(&mut inner)?;
		inner
			.transactions
			.get(hash)
			.cloned()
			.ok_or_else(|| RpcError::RemoteError {
				code: -100,
				message: "Unknown transaction".to_string(),
			})
	}

	async fn get_populated_blocks(
		&self,
		count: u64,
		end_height: u64,
	) -> Result<PopulatedBlocks, RpcError> {
		let mut inner = self.inner.lock();
		Self::record(&mut inner, "expressgetpopulatedblocks");
		if inner.scan_failures > 0 {
			inner.scan_failures -= 1;
			return Err(RpcError::StatusError(502));
		}
		let Some(populated) = inner.populated.as_ref() else {
			return Err(RpcError::MethodNotFound(
				"expressgetpopulatedblocks".to_string(),
			));
		};
		let mut blocks: Vec<u64> = populated
			.range(..=end_height)
			.rev()
			.take(count as usize)
			.copied()
			.collect();
		blocks.extend_from_slice(&inner.stray_populated);

		if let Some((remaining, _)) = inner.next_cache_id.as_mut() {
			if *remaining == 0 {
				if let Some((_, cache_id)) = inner.next_cache_id.take() {
					inner.cache_id = cache_id;
				}
			} else {
				*remaining -= 1;
			}
		}
		Ok(PopulatedBlocks {
			blocks,
			cache_id: inner.cache_id.clone(),
		})
	}

	async fn invoke(
		&self,
		contract: &str,
		method: &str,
		args: Vec<ContractParameter>,
	) -> Result<InvokeResult, RpcError> {
		let mut inner = self.inner.lock();
		Self::record(&mut inner, "invokefunction");
		Self::take_lookup_failure(&mut inner)?;
		assert_eq!(method, "balanceOf");
		let script_hash = args
			.first()
			.and_then(|arg| arg.value.as_str())
			.unwrap_or_default()
			.to_string();
		let stack = inner
			.balances
			.get(&(contract.to_string(), script_hash))
			.map(|amount| {
				vec![StackItem {
					kind: "Integer".to_string(),
					value: Some(serde_json::Value::from(amount.as_str())),
				}]
			})
			.unwrap_or_default();
		Ok(InvokeResult {
			state: Some("HALT".to_string()),
			gas_consumed: None,
			exception: None,
			stack,
		})
	}

	fn url(&self) -> &str {
		"mock://node"
	}
}
