//! Bounded, fixed-delay retrying for on-demand lookups.

use crate::rpc::RpcError;

use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times a lookup is attempted and how long to pause in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			delay,
		}
	}

	/// A policy performing exactly one attempt
	pub fn once() -> Self {
		Self::new(1, Duration::ZERO)
	}

	fn backoff(&self) -> AttemptBackoff {
		AttemptBackoff {
			retries: self.max_attempts - 1,
			remaining: self.max_attempts - 1,
			delay: self.delay,
		}
	}
}

/// Constant delay that gives up after a fixed number of retries.
struct AttemptBackoff {
	retries: u32,
	remaining: u32,
	delay: Duration,
}

impl Backoff for AttemptBackoff {
	fn next_backoff(&mut self) -> Option<Duration> {
		if self.remaining == 0 {
			return None;
		}
		self.remaining -= 1;
		Some(self.delay)
	}

	fn reset(&mut self) {
		self.remaining = self.retries;
	}
}

/// Run `operation` under `policy`, returning `None` once every attempt has failed.
///
/// `what` names the lookup in log lines.
pub async fn with_retry<T, F, Fut>(what: &str, policy: RetryPolicy, mut operation: F) -> Option<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, RpcError>>,
{
	let mut attempt = 0u32;
	let result = backoff::future::retry_notify(
		policy.backoff(),
		|| {
			attempt += 1;
			debug!("Retrieving {} (attempt {})", what, attempt);
			let pending = operation();
			async move { pending.await.map_err(backoff::Error::transient) }
		},
		|e: RpcError, delay: Duration| {
			warn!("Error retrieving {}: {} (retrying in {:?})", what, e, delay);
		},
	)
	.await;

	match result {
		Ok(value) => Some(value),
		Err(e) => {
			warn!("Error retrieving {}: {}", what, e);
			None
		}
	}
}
