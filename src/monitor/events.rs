//! Change notifications.
//!
//! The monitor publishes the latest known height whenever something observable changed: the
//! height advanced, a block became known as populated, population scanning became available,
//! or the chain generation was reset. Consumers hold a `ChangeSubscription` each; dropping it
//! detaches that consumer only. Closing the notifier ends every subscription.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered notifications per subscriber before the oldest are skipped.
const CHANNEL_CAPACITY: usize = 64;

/// Publishing side of the change stream
pub struct ChangeNotifier {
	sender: Mutex<Option<broadcast::Sender<u64>>>,
}

impl ChangeNotifier {
	pub fn new() -> Self {
		let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
		Self {
			sender: Mutex::new(Some(sender)),
		}
	}

	/// Publish `height` to every live subscription.
	///
	/// Returns the number of subscribers reached.
	pub fn notify(&self, height: u64) -> usize {
		match self.sender.lock().as_ref() {
			Some(sender) => sender.send(height).unwrap_or(0),
			None => 0,
		}
	}

	/// Open a new subscription. After `close` the subscription ends immediately.
	pub fn subscribe(&self) -> ChangeSubscription {
		let receiver = self.sender.lock().as_ref().map(|sender| sender.subscribe());
		ChangeSubscription { receiver }
	}

	/// Stop publishing; every subscription drains what it has buffered and then ends
	pub fn close(&self) {
		self.sender.lock().take();
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender
			.lock()
			.as_ref()
			.map(|sender| sender.receiver_count())
			.unwrap_or(0)
	}
}

impl Default for ChangeNotifier {
	fn default() -> Self {
		Self::new()
	}
}

/// Receiving side of the change stream for one consumer
pub struct ChangeSubscription {
	receiver: Option<broadcast::Receiver<u64>>,
}

impl ChangeSubscription {
	/// Wait for the next notification, or `None` once the notifier is closed.
	///
	/// A slow consumer that fell behind skips straight to the newer heights.
	pub async fn next(&mut self) -> Option<u64> {
		let receiver = self.receiver.as_mut()?;
		loop {
			match receiver.recv().await {
				Ok(height) => return Some(height),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					debug!("Change subscriber lagged, skipped {} notifications", skipped);
				}
				Err(broadcast::error::RecvError::Closed) => {
					self.receiver = None;
					return None;
				}
			}
		}
	}

	/// The most recent buffered notification without waiting, if any
	pub fn latest(&mut self) -> Option<u64> {
		let receiver = self.receiver.as_mut()?;
		let mut latest = None;
		loop {
			match receiver.try_recv() {
				Ok(height) => latest = Some(height),
				Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
				Err(_) => return latest,
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_notify_reaches_each_subscriber() {
		let notifier = ChangeNotifier::new();
		let mut first = notifier.subscribe();
		let mut second = notifier.subscribe();

		assert_eq!(notifier.notify(101), 2);
		assert_eq!(first.next().await, Some(101));
		assert_eq!(second.next().await, Some(101));
	}

	#[tokio::test]
	async fn test_dropped_subscription_detaches() {
		let notifier = ChangeNotifier::new();
		let first = notifier.subscribe();
		let _second = notifier.subscribe();
		assert_eq!(notifier.subscriber_count(), 2);

		drop(first);
		assert_eq!(notifier.subscriber_count(), 1);
		assert_eq!(notifier.notify(7), 1);
	}

	#[tokio::test]
	async fn test_close_ends_subscriptions() {
		let notifier = ChangeNotifier::new();
		let mut subscription = notifier.subscribe();
		notifier.notify(5);
		notifier.close();

		assert_eq!(subscription.next().await, Some(5));
		assert_eq!(subscription.next().await, None);
		assert_eq!(notifier.notify(6), 0);
		assert_eq!(notifier.subscribe().next().await, None);
	}

	#[test]
	fn test_latest_skips_to_newest() {
		let notifier = ChangeNotifier::new();
		let mut subscription = notifier.subscribe();
		assert_eq!(subscription.latest(), None);
		notifier.notify(1);
		notifier.notify(2);
		notifier.notify(3);
		assert_eq!(subscription.latest(), Some(3));
	}
}
