//! Shared key-value store contract plus the built-in in-memory and file-backed stores.
//!
//! The store is the single source of truth for credentials and the only coordination point
//! between brokers: values expire through the store's TTL, and refresh exclusivity comes from
//! [`SharedStore::try_lock`], never from process-local flags.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialKind, Namespace, OwnerId},
};

/// Boxed future returned by [`SharedStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract shared by every process in the fleet.
pub trait SharedStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present and not expired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, expiring it after `ttl`.
	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Attempts to take the named lock, retrying for up to `wait` before giving up.
	///
	/// A zero `wait` performs exactly one attempt. An acquired lock is held for `hold` and then
	/// expires on its own; there is no explicit release.
	fn try_lock<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		hold: Duration,
	) -> StoreFuture<'a, bool>;
}

/// Error type produced by [`SharedStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Value and lock keys used for one credential kind of one owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKeys {
	/// Key holding the raw credential value.
	pub value: String,
	/// Key of the refresh lock guarding the value.
	pub lock: String,
}
impl StoreKeys {
	/// Builds the key pair for the provided namespace, owner, and credential kind.
	pub fn new(namespace: &Namespace, owner: &OwnerId, kind: CredentialKind) -> Self {
		let segment = kind.key_segment();

		Self {
			value: format!("{namespace}:{segment}:value:{owner}"),
			lock: format!("{namespace}:{segment}:refresh:lock:{owner}"),
		}
	}
}

/// Converts a broker duration into the std duration timers expect, clamping negatives to zero.
pub(crate) fn std_duration(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}
