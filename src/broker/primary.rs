//! Primary access-token broker.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKind, OwnerId},
	broker::{BrokerMetrics, RefreshStamp, cycle::RefreshCycle},
	config::BrokerConfig,
	error::RefreshError,
	issuer::Issuer,
	notice::{ChangeListener, ChangeListeners, ListenerId},
	obs::RefreshSpan,
	store::{SharedStore, StoreKeys},
};
#[cfg(feature = "reqwest")] use crate::http::{IssuerEndpoints, ReqwestIssuer};

/// Serves one owner's access token from the shared store, refreshing it at most once per
/// expiry across every broker that shares the store.
///
/// Share a broker behind [`Arc`]; the only coordination between callers (in this process or
/// any other) is the store lock, so any number of brokers may point at the same store.
pub struct TokenBroker {
	config: BrokerConfig,
	issuer: Arc<dyn Issuer>,
	cycle: RefreshCycle,
}
impl TokenBroker {
	/// Builds a broker over the provided store and issuer after validating `config`.
	pub fn new(
		config: BrokerConfig,
		store: Arc<dyn SharedStore>,
		issuer: Arc<dyn Issuer>,
	) -> Result<Self> {
		config.validate()?;

		let keys = StoreKeys::new(&config.namespace, &config.owner_id, CredentialKind::Primary);
		let cycle = RefreshCycle::new(
			CredentialKind::Primary,
			config.owner_id.clone(),
			keys,
			store,
			config.policy,
			Default::default(),
			CancellationToken::new(),
		);

		Ok(Self { config, issuer, cycle })
	}

	/// Builds a broker that calls the provided endpoints through a default reqwest client.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(
		config: BrokerConfig,
		store: Arc<dyn SharedStore>,
		endpoints: IssuerEndpoints,
	) -> Result<Self> {
		let issuer = ReqwestIssuer::new(endpoints)?;

		Self::new(config, store, Arc::new(issuer))
	}

	/// Returns a valid access token, refreshing it behind the store lock when missing.
	///
	/// Fails with [`Error::RefreshFailure`] once every lock/poll attempt finished without a
	/// value, or when [`TokenBroker::shutdown`] interrupts the wait.
	pub async fn get_token(&self) -> Result<Credential> {
		let span = RefreshSpan::new(CredentialKind::Primary, "get_token");
		let this = self;

		span.instrument(self.cycle.obtain(move || async move {
			this.issuer
				.issue_access_token(&this.config.owner_id, &this.config.secret)
				.await
				.map_err(RefreshError::from)
		}))
		.await
	}

	/// Fetches the token once so the first real caller hits the fast path.
	pub async fn warm_up(&self) -> Result<()> {
		self.get_token().await.map(|_| ())
	}

	/// Cancels in-flight poll waits on this broker and every dependent broker built from it.
	///
	/// Cancellation is permanent: later calls still serve stored values and refresh when they
	/// win the lock, but fail as soon as they would have to wait for another refresher.
	pub fn shutdown(&self) {
		self.cycle.cancel.cancel();
	}

	/// Registers a listener for notices from this broker and its dependent brokers.
	pub fn add_listener(&self, listener: impl ChangeListener + 'static) -> ListenerId {
		self.cycle.listeners.add(listener)
	}

	/// Unregisters a listener; returns `false` if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.cycle.listeners.remove(id)
	}

	/// Unregisters every listener.
	pub fn remove_all_listeners(&self) {
		self.cycle.listeners.clear();
	}

	/// Owner the broker serves.
	pub fn owner_id(&self) -> &OwnerId {
		&self.config.owner_id
	}

	/// Validated configuration the broker was built with.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Store keys holding the access token and its refresh lock.
	pub fn keys(&self) -> &StoreKeys {
		&self.cycle.keys
	}

	/// Counters for this broker's refresh cycles.
	pub fn metrics(&self) -> &BrokerMetrics {
		&self.cycle.metrics
	}

	/// Latest refresh started by this broker, if it is in flight or committed.
	pub fn last_refresh(&self) -> Option<RefreshStamp> {
		self.cycle.last_refresh()
	}

	pub(crate) fn issuer(&self) -> &dyn Issuer {
		self.issuer.as_ref()
	}

	pub(crate) fn store(&self) -> &Arc<dyn SharedStore> {
		&self.cycle.store
	}

	pub(crate) fn listeners(&self) -> &Arc<ChangeListeners> {
		&self.cycle.listeners
	}

	pub(crate) fn cancellation(&self) -> &CancellationToken {
		&self.cycle.cancel
	}
}
impl Debug for TokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("config", &self.config)
			.field("cycle", &self.cycle)
			.field("listeners", self.listeners())
			.finish()
	}
}
