//! Thread-safe in-memory [`SharedStore`] implementation for local development and tests.
//!
//! Expiry is tracked with [`tokio::time::Instant`], so tests running on a paused Tokio clock
//! can advance past TTLs and lock holds deterministically.

// crates.io
use tokio::time::{self as tokio_time, Instant};
// self
use crate::{
	_prelude::*,
	store::{SharedStore, StoreFuture, std_duration},
};

#[derive(Debug)]
struct Entry {
	value: String,
	expires_at: Instant,
}

#[derive(Debug, Default)]
struct StoreState {
	values: HashMap<String, Entry>,
	locks: HashMap<String, Instant>,
}

/// Thread-safe storage backend that keeps values and locks in-process.
///
/// Cloning shares the underlying map, so several brokers built over clones of one
/// `MemoryStore` coordinate exactly like separate processes sharing a remote store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<Mutex<StoreState>>);
impl MemoryStore {
	const LOCK_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

	/// Returns the remaining TTL of a live value, if any.
	pub fn ttl_of(&self, key: &str) -> Option<Duration> {
		let now = Instant::now();
		let guard = self.0.lock();
		let entry = guard.values.get(key).filter(|entry| entry.expires_at > now)?;

		Duration::try_from(entry.expires_at - now).ok()
	}

	/// Returns `true` while the named lock is held and unexpired.
	pub fn is_locked(&self, lock_key: &str) -> bool {
		let now = Instant::now();

		self.0.lock().locks.get(lock_key).is_some_and(|expires_at| *expires_at > now)
	}

	/// Number of live (unexpired) values.
	pub fn len(&self) -> usize {
		let now = Instant::now();

		self.0.lock().values.values().filter(|entry| entry.expires_at > now).count()
	}

	/// Returns `true` when no live value is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn get_now(&self, key: &str) -> Option<String> {
		let now = Instant::now();
		let mut guard = self.0.lock();

		match guard.values.get(key) {
			Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
			Some(_) => {
				guard.values.remove(key);

				None
			},
			None => None,
		}
	}

	fn set_now(&self, key: &str, value: String, ttl: Duration) {
		let mut guard = self.0.lock();

		if !ttl.is_positive() {
			guard.values.remove(key);

			return;
		}

		let expires_at = Instant::now() + std_duration(ttl);

		guard.values.insert(key.to_owned(), Entry { value, expires_at });
	}

	fn lock_now(&self, lock_key: &str, hold: Duration) -> bool {
		let now = Instant::now();
		let mut guard = self.0.lock();

		match guard.locks.get(lock_key) {
			Some(expires_at) if *expires_at > now => false,
			_ => {
				guard.locks.insert(lock_key.to_owned(), now + std_duration(hold));

				true
			},
		}
	}
}
impl SharedStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.get_now(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key, value, ttl);

			Ok(())
		})
	}

	fn try_lock<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		hold: Duration,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let deadline = Instant::now() + std_duration(wait);

			loop {
				if self.lock_now(lock_key, hold) {
					return Ok(true);
				}

				let now = Instant::now();

				if now >= deadline {
					return Ok(false);
				}

				tokio_time::sleep(Self::LOCK_RETRY_INTERVAL.min(deadline - now)).await;
			}
		})
	}
}
