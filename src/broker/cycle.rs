//! Lookup, lock, refresh, and poll cycle shared by both brokers.

// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKind, IssuedToken, OwnerId, TokenSecret},
	broker::{BrokerMetrics, RefreshStamp},
	config::RefreshPolicy,
	error::{FailureReason, IssuerError, RefreshError},
	notice::{ChangeListeners, ChangeNotice},
	obs::{self, RefreshOutcome},
	store::{SharedStore, StoreKeys, std_duration},
};

/// Per-kind refresh state machine: `Fresh -> Missing -> Refreshing -> Fresh | Missing`.
///
/// Only the store decides which state a credential is in; the cycle keeps no in-process flag.
pub(crate) struct RefreshCycle {
	pub(crate) kind: CredentialKind,
	pub(crate) owner_id: OwnerId,
	pub(crate) keys: StoreKeys,
	pub(crate) store: Arc<dyn SharedStore>,
	pub(crate) policy: RefreshPolicy,
	pub(crate) listeners: Arc<ChangeListeners>,
	pub(crate) cancel: CancellationToken,
	pub(crate) metrics: BrokerMetrics,
	stamp: Mutex<Option<RefreshStamp>>,
}
impl RefreshCycle {
	pub(crate) fn new(
		kind: CredentialKind,
		owner_id: OwnerId,
		keys: StoreKeys,
		store: Arc<dyn SharedStore>,
		policy: RefreshPolicy,
		listeners: Arc<ChangeListeners>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			kind,
			owner_id,
			keys,
			store,
			policy,
			listeners,
			cancel,
			metrics: BrokerMetrics::default(),
			stamp: Mutex::new(None),
		}
	}

	pub(crate) fn last_refresh(&self) -> Option<RefreshStamp> {
		*self.stamp.lock()
	}

	pub(crate) fn clear_stamp(&self) {
		self.stamp.lock().take();
	}

	/// Runs one full cycle, calling `refresh` at most once per won lock attempt.
	pub(crate) async fn obtain<F, Fut>(&self, refresh: F) -> Result<Credential>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<IssuedToken, RefreshError>>,
	{
		self.metrics.record_request();
		obs::record_refresh_outcome(self.kind, RefreshOutcome::Attempt);

		if let Some(credential) = self.lookup().await {
			return Ok(self.served_from_store(credential));
		}

		let attempts = self.policy.max_lock_attempts;

		for attempt in 1..=attempts {
			let refreshed = if self.acquire(attempt).await {
				self.refresh_and_commit(&refresh).await
			} else {
				None
			};

			if let Some(credential) = refreshed {
				return Ok(credential);
			}

			let found = if attempt < attempts || attempts == 1 {
				self.poll().await?
			} else {
				self.lookup().await
			};

			if let Some(credential) = found {
				return Ok(self.served_from_store(credential));
			}
		}

		self.metrics.record_exhausted();
		obs::record_refresh_outcome(self.kind, RefreshOutcome::Exhausted);

		Err(Error::RefreshFailure { kind: self.kind, reason: FailureReason::Exhausted { attempts } })
	}

	fn served_from_store(&self, credential: Credential) -> Credential {
		self.metrics.record_cache_hit();
		obs::record_refresh_outcome(self.kind, RefreshOutcome::Hit);

		credential
	}

	// Store errors and blank entries read as a miss.
	async fn lookup(&self) -> Option<Credential> {
		let raw = match self.store.get(&self.keys.value).await {
			Ok(raw) => raw?,
			Err(e) => {
				obs::warn_absorbed(self.kind, "lookup", &e);

				return None;
			},
		};

		if raw.trim().is_empty() {
			return None;
		}

		Some(Credential::stored(self.kind, TokenSecret::new(raw)))
	}

	async fn acquire(&self, attempt: u32) -> bool {
		let acquired = match self
			.store
			.try_lock(&self.keys.lock, self.policy.lock_wait, self.policy.lock_hold)
			.await
		{
			Ok(acquired) => acquired,
			Err(e) => {
				obs::warn_absorbed(self.kind, "lock", &e);

				false
			},
		};

		self.metrics.record_lock(acquired);

		if !acquired {
			obs::debug_contended(self.kind, attempt);
		}

		acquired
	}

	async fn poll(&self) -> Result<Option<Credential>> {
		let deadline = Instant::now() + std_duration(self.policy.poll_window);
		let interval = std_duration(self.policy.poll_interval);

		loop {
			if let Some(credential) = self.lookup().await {
				return Ok(Some(credential));
			}

			let now = Instant::now();

			if now >= deadline {
				return Ok(None);
			}

			tokio::select! {
				() = self.cancel.cancelled() => {
					obs::record_refresh_outcome(self.kind, RefreshOutcome::Cancelled);

					return Err(Error::RefreshFailure {
						kind: self.kind,
						reason: FailureReason::Cancelled,
					});
				},
				() = tokio::time::sleep(interval.min(deadline - now)) => {},
			}
		}
	}

	async fn refresh_and_commit<F, Fut>(&self, refresh: &F) -> Option<Credential>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<IssuedToken, RefreshError>>,
	{
		let started_at = OffsetDateTime::now_utc();
		let previous = self
			.stamp
			.lock()
			.replace(RefreshStamp { refreshed_at: started_at, ttl: self.policy.ttl.resolve(None) });

		self.metrics.record_issuer_call();

		let committed = self.mint(refresh, started_at).await;

		self.metrics.record_refresh(committed.is_ok());

		match committed {
			Ok((credential, stamp)) => {
				*self.stamp.lock() = Some(stamp);

				obs::record_refresh_outcome(self.kind, RefreshOutcome::Refreshed);
				obs::info_committed(self.kind, &self.owner_id, stamp.ttl.whole_seconds());

				self.listeners.notify(&ChangeNotice {
					owner_id: self.owner_id.clone(),
					kind: self.kind,
					new_value: credential.value.clone(),
				});

				Some(credential)
			},
			Err(e) => {
				*self.stamp.lock() = previous;

				obs::record_refresh_outcome(self.kind, RefreshOutcome::Failure);
				obs::warn_absorbed(self.kind, "refresh", &e);

				None
			},
		}
	}

	async fn mint<F, Fut>(
		&self,
		refresh: &F,
		issued_at: OffsetDateTime,
	) -> Result<(Credential, RefreshStamp), RefreshError>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<IssuedToken, RefreshError>>,
	{
		let issued = refresh().await?;

		if issued.value.expose().trim().is_empty() {
			return Err(IssuerError::EmptyValue { code: 0, message: "empty value".into() }.into());
		}

		let ttl = self.policy.ttl.resolve(issued.expires_in);

		self.store.set(&self.keys.value, issued.value.expose().to_owned(), ttl).await?;

		let credential = Credential::minted(self.kind, issued.value, issued_at, ttl);

		Ok((credential, RefreshStamp { refreshed_at: issued_at, ttl }))
	}
}
impl Debug for RefreshCycle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCycle")
			.field("kind", &self.kind)
			.field("owner_id", &self.owner_id)
			.field("keys", &self.keys)
			.field("policy", &self.policy)
			.field("metrics", &self.metrics)
			.field("last_refresh", &self.last_refresh())
			.finish()
	}
}
