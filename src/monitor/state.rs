//! Generation-scoped monitor state.
//!
//! `MonitorState` holds everything the monitor has learned about one instance of the remote
//! chain: bounded block and transaction caches, the populated-block bit index, the last known
//! height, and the timestamps of recent observable changes used to pace polling. When the node
//! reports a different cache generation the whole value is replaced, never patched.

use crate::monitor::MonitorConfig;
use crate::rpc::{Block, BlockId, Transaction};

use bitvec::array::BitArray;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Heights covered by one page of the populated index.
const PAGE_BITS: u64 = 4096;

/// One fixed-size page of populated flags, `PAGE_BITS` wide.
type Page = BitArray<[u64; (PAGE_BITS / 64) as usize]>;

/// Bounds copied out of the monitor configuration.
#[derive(Debug, Clone, Copy)]
struct StateLimits {
	block_cache_size: usize,
	transaction_cache_size: usize,
	speed_detection_window: usize,
	min_refresh_interval: Duration,
	max_refresh_interval: Duration,
	refresh_damping: f64,
}

impl From<&MonitorConfig> for StateLimits {
	fn from(config: &MonitorConfig) -> Self {
		Self {
			block_cache_size: config.block_cache_size,
			transaction_cache_size: config.transaction_cache_size,
			speed_detection_window: config.speed_detection_window,
			min_refresh_interval: config.min_refresh_interval,
			max_refresh_interval: config.max_refresh_interval,
			refresh_damping: config.refresh_damping,
		}
	}
}

/// Cached view of one chain generation
#[derive(Debug)]
pub struct MonitorState {
	/// Opaque chain instance id reported by the node
	cache_generation: String,
	/// Times of recent observable changes, newest first
	recent_updates: VecDeque<Instant>,
	/// Blocks in insertion order, oldest first
	cached_blocks: VecDeque<Block>,
	/// Transactions in insertion order, oldest first
	cached_transactions: VecDeque<Transaction>,
	/// Bit `h % PAGE_BITS` of page `h / PAGE_BITS` set means height `h` holds at least one
	/// transaction. Only pages with a set bit are allocated.
	populated_blocks: BTreeMap<u64, Page>,
	last_known_height: u64,
	limits: StateLimits,
}

impl MonitorState {
	/// Create an empty state for `cache_generation`, seeded with a single update sample at `now`.
	pub fn new(cache_generation: impl Into<String>, config: &MonitorConfig, now: Instant) -> Self {
		let mut state = Self {
			cache_generation: cache_generation.into(),
			recent_updates: VecDeque::from([now]),
			cached_blocks: VecDeque::new(),
			cached_transactions: VecDeque::new(),
			populated_blocks: BTreeMap::new(),
			last_known_height: 0,
			limits: StateLimits::from(config),
		};
		// Genesis counts as populated even without transactions.
		state.mark_populated(0);
		state
	}

	pub fn cache_generation(&self) -> &str {
		&self.cache_generation
	}

	pub fn last_known_height(&self) -> u64 {
		self.last_known_height
	}

	pub fn set_last_known_height(&mut self, height: u64) {
		self.last_known_height = height;
	}

	/// Find a cached block by height or hash
	pub fn find_block(&self, id: &BlockId) -> Option<&Block> {
		self.cached_blocks.iter().find(|block| id.matches(block))
	}

	/// Cache a block unless it is within one block of the head.
	///
	/// Returns whether the block was inserted. The oldest block is evicted once the cache is full.
	pub fn cache_block(&mut self, block: Block) -> bool {
		if block.index.saturating_add(1) >= self.last_known_height
			|| self.limits.block_cache_size == 0
			|| self.find_block(&BlockId::Height(block.index)).is_some()
		{
			return false;
		}
		while self.cached_blocks.len() >= self.limits.block_cache_size {
			self.cached_blocks.pop_front();
		}
		self.cached_blocks.push_back(block);
		true
	}

	pub fn find_transaction(&self, hash: &str) -> Option<&Transaction> {
		self.cached_transactions.iter().find(|tx| tx.hash == hash)
	}

	/// Cache a transaction, evicting the oldest once the cache is full
	pub fn cache_transaction(&mut self, transaction: Transaction) -> bool {
		if self.limits.transaction_cache_size == 0
			|| self.find_transaction(&transaction.hash).is_some()
		{
			return false;
		}
		while self.cached_transactions.len() >= self.limits.transaction_cache_size {
			self.cached_transactions.pop_front();
		}
		self.cached_transactions.push_back(transaction);
		true
	}

	pub fn cached_block_count(&self) -> usize {
		self.cached_blocks.len()
	}

	pub fn cached_transaction_count(&self) -> usize {
		self.cached_transactions.len()
	}

	pub fn is_populated(&self, height: u64) -> bool {
		let (page, offset) = page_of(height);
		self.populated_blocks
			.get(&page)
			.is_some_and(|bits| bits[offset])
	}

	/// Set the bit for `height`, returning true if it was previously unset
	pub fn mark_populated(&mut self, height: u64) -> bool {
		let (page, offset) = page_of(height);
		!self
			.populated_blocks
			.entry(page)
			.or_insert(Page::ZERO)
			.replace(offset, true)
	}

	/// Number of allocated index pages
	pub fn populated_page_count(&self) -> usize {
		self.populated_blocks.len()
	}

	pub fn recent_update_count(&self) -> usize {
		self.recent_updates.len()
	}

	/// Record an observable change at `now`, keeping only the most recent samples
	pub fn record_update(&mut self, now: Instant) {
		self.recent_updates.push_front(now);
		self.recent_updates
			.truncate(self.limits.speed_detection_window);
	}

	/// Polling interval derived from recent update gaps, measured up to the current time
	pub fn current_refresh_interval(&self) -> Duration {
		self.refresh_interval_at(Instant::now())
	}

	/// Mean gap between recent updates (with `now` closing the newest gap), damped and clamped
	/// to the configured bounds. Without any gap the minimum interval is returned.
	pub fn refresh_interval_at(&self, now: Instant) -> Duration {
		let mut total = Duration::ZERO;
		let mut gaps = 0u32;
		let mut previous = now;
		for &timestamp in &self.recent_updates {
			total += previous.saturating_duration_since(timestamp);
			gaps += 1;
			previous = timestamp;
		}
		if gaps == 0 {
			return self.limits.min_refresh_interval;
		}

		let mean_ms = total.as_secs_f64() * 1000.0 / f64::from(gaps);
		let computed = Duration::from_millis((mean_ms * self.limits.refresh_damping).round() as u64);
		computed
			.max(self.limits.min_refresh_interval)
			.min(self.limits.max_refresh_interval)
	}
}

fn page_of(height: u64) -> (u64, usize) {
	(height / PAGE_BITS, (height % PAGE_BITS) as usize)
}
