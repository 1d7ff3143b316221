// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one broker's refresh cycles.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	requests: AtomicU64,
	cache_hits: AtomicU64,
	locks_acquired: AtomicU64,
	locks_contended: AtomicU64,
	issuer_calls: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
	exhausted: AtomicU64,
}
impl BrokerMetrics {
	/// Returns the number of `get_token` calls that reached the store.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of calls answered from the store without refreshing here.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of lock attempts this broker won.
	pub fn locks_acquired(&self) -> u64 {
		self.locks_acquired.load(Ordering::Relaxed)
	}

	/// Returns the number of lock attempts lost to another holder (or to a store error).
	pub fn locks_contended(&self) -> u64 {
		self.locks_contended.load(Ordering::Relaxed)
	}

	/// Returns the number of issuer calls started.
	pub fn issuer_calls(&self) -> u64 {
		self.issuer_calls.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes committed to the store.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that failed before committing.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that ended with an exhausted refresh failure.
	pub fn exhausted(&self) -> u64 {
		self.exhausted.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_lock(&self, acquired: bool) {
		if acquired {
			self.locks_acquired.fetch_add(1, Ordering::Relaxed);
		} else {
			self.locks_contended.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_issuer_call(&self) {
		self.issuer_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self, committed: bool) {
		if committed {
			self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		} else {
			self.refresh_failures.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_exhausted(&self) {
		self.exhausted.fetch_add(1, Ordering::Relaxed);
	}
}
