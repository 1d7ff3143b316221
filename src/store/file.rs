//! Directory-backed [`SharedStore`] that several processes on one host can share.
//!
//! Every key lives in its own JSON file carrying an absolute expiry. Values and locks are first
//! written to a uniquely named temporary file; values are then renamed into place, while locks
//! are hard-linked into place so that exactly one process wins a free lock. Expired values are
//! left on disk until the next write replaces them.
//!
//! Taking over a lock whose hold has elapsed requires a claim file named after the stale
//! holder. Only the process that creates the claim may remove that holder's lock, and it
//! re-reads the lock under the claim first, so one stale lock yields at most one new holder.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	store::{SharedStore, StoreError, StoreFuture, std_duration},
};

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
	value: String,
	expires_at_ms: i128,
}

#[derive(Debug, Serialize, Deserialize)]
struct LockEntry {
	holder: u64,
	expires_at_ms: i128,
}

/// Lock file contents as seen by a process that lost the race to create it.
#[derive(Debug, PartialEq, Eq)]
enum LockState {
	Vacant,
	Held,
	Stale(String),
}

/// Persists values and locks as individual files below a root directory.
#[derive(Clone, Debug)]
pub struct FileStore {
	root: PathBuf,
}
impl FileStore {
	const CLAIM_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
	const LOCK_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

	/// Opens (or creates) a store rooted at the provided directory.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let root = root.into();

		fs::create_dir_all(&root).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", root.display()),
		})?;

		Ok(Self { root })
	}

	/// Directory holding the store files.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn value_path(&self, key: &str) -> PathBuf {
		self.root.join(format!("v-{}.json", encode_key(key)))
	}

	fn lock_path(&self, key: &str) -> PathBuf {
		self.root.join(format!("l-{}.lock", encode_key(key)))
	}

	fn claim_path(&self, key: &str, stale: &str) -> PathBuf {
		self.root.join(format!("c-{}-{stale}.claim", encode_key(key)))
	}

	fn get_now(&self, key: &str) -> Result<Option<String>, StoreError> {
		let path = self.value_path(key);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				}),
		};
		let entry: FileEntry =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		// Readers never delete; a peer may rename a fresh value onto this path at any time.
		if entry.expires_at_ms <= now_ms() {
			return Ok(None);
		}

		Ok(Some(entry.value))
	}

	fn set_now(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
		let path = self.value_path(key);

		if !ttl.is_positive() {
			return remove_if_present(&path);
		}

		let entry = FileEntry { value, expires_at_ms: now_ms() + ttl.whole_milliseconds() };
		let serialized = serde_json::to_vec(&entry).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize entry for {key}: {e}"),
		})?;
		let tmp_path = self.write_temp(&serialized)?;

		fs::rename(&tmp_path, &path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}

	fn lock_now(&self, lock_key: &str, hold: Duration) -> Result<bool, StoreError> {
		let path = self.lock_path(lock_key);
		let entry = LockEntry {
			holder: rand::random(),
			expires_at_ms: now_ms() + hold.whole_milliseconds(),
		};
		let serialized = serde_json::to_vec(&entry).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize lock {lock_key}: {e}"),
		})?;

		if self.install_lock(&path, &serialized)? {
			return Ok(true);
		}

		let stale = match read_lock(&path)? {
			LockState::Vacant => return self.install_lock(&path, &serialized),
			LockState::Held => return Ok(false),
			LockState::Stale(stale) => stale,
		};
		let claim = self.claim_path(lock_key, &stale);

		if !claim_stale_lock(&claim)? {
			return Ok(false);
		}

		let taken = self.take_over(&path, &stale, &serialized);

		remove_if_present(&claim)?;

		taken
	}

	// Runs while holding the claim for `stale`, the only process allowed to remove that lock.
	fn take_over(&self, path: &Path, stale: &str, serialized: &[u8]) -> Result<bool, StoreError> {
		match read_lock(path)? {
			LockState::Stale(current) if current == stale => remove_if_present(path)?,
			LockState::Vacant => {},
			_ => return Ok(false),
		}

		self.install_lock(path, serialized)
	}

	// Hard-linking a complete temp file never replaces an existing lock.
	fn install_lock(&self, path: &Path, serialized: &[u8]) -> Result<bool, StoreError> {
		let tmp_path = self.write_temp(serialized)?;
		let linked = match fs::hard_link(&tmp_path, path) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to create {}: {e}", path.display()),
			}),
		};

		remove_if_present(&tmp_path)?;

		linked
	}

	fn write_temp(&self, bytes: &[u8]) -> Result<PathBuf, StoreError> {
		let tmp_path = self.root.join(format!(".tmp-{:016x}", rand::random::<u64>()));
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(bytes).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;

		Ok(tmp_path)
	}
}
impl SharedStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { self.get_now(key) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.set_now(key, value, ttl) })
	}

	fn try_lock<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		hold: Duration,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let deadline = tokio::time::Instant::now() + std_duration(wait);

			loop {
				if self.lock_now(lock_key, hold)? {
					return Ok(true);
				}

				let now = tokio::time::Instant::now();

				if now >= deadline {
					return Ok(false);
				}

				tokio::time::sleep(Self::LOCK_RETRY_INTERVAL.min(deadline - now)).await;
			}
		})
	}
}

fn read_lock(path: &Path) -> Result<LockState, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LockState::Vacant),
		Err(e) =>
			return Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
	};

	// Locks are linked in complete, so an unreadable one was corrupted and never expires alone.
	match serde_json::from_slice::<LockEntry>(&bytes) {
		Ok(entry) if entry.expires_at_ms <= now_ms() =>
			Ok(LockState::Stale(format!("{:016x}", entry.holder))),
		Ok(_) => Ok(LockState::Held),
		Err(_) => Ok(LockState::Stale("unreadable".into())),
	}
}

// A claim left behind by a crashed process is cleared once it outlives the timeout; the caller
// still loses this round and retries on its next attempt.
fn claim_stale_lock(claim: &Path) -> Result<bool, StoreError> {
	match OpenOptions::new().write(true).create_new(true).open(claim) {
		Ok(_) => Ok(true),
		Err(e) if e.kind() == ErrorKind::AlreadyExists => {
			let abandoned = fs::metadata(claim)
				.and_then(|meta| meta.modified())
				.ok()
				.and_then(|modified| modified.elapsed().ok())
				.is_some_and(|age| age > FileStore::CLAIM_TIMEOUT);

			if abandoned {
				remove_if_present(claim)?;
			}

			Ok(false)
		},
		Err(e) => Err(StoreError::Backend {
			message: format!("Failed to create {}: {e}", claim.display()),
		}),
	}
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(StoreError::Backend {
			message: format!("Failed to remove {}: {e}", path.display()),
		}),
	}
}

fn encode_key(key: &str) -> String {
	form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

fn now_ms() -> i128 {
	OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
