//! Dependent ticket broker layered on a [`TokenBroker`].

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKind},
	broker::{BrokerMetrics, RefreshStamp, TokenBroker, cycle::RefreshCycle},
	error::RefreshError,
	notice::{ChangeListener, ListenerId},
	obs::RefreshSpan,
	store::StoreKeys,
};

/// Serves the ticket minted from the primary access token.
///
/// Shares the primary broker's store, issuer, policy, namespace, and listener registry. Its
/// cancellation is a child of the primary's, so shutting the primary down also stops waits
/// here.
pub struct DependentTokenBroker {
	primary: Arc<TokenBroker>,
	enabled: AtomicBool,
	cycle: RefreshCycle,
}
impl DependentTokenBroker {
	/// Builds a dependent broker; it starts enabled when the primary's config says so.
	pub fn new(primary: Arc<TokenBroker>) -> Self {
		let config = primary.config();
		let keys = StoreKeys::new(&config.namespace, &config.owner_id, CredentialKind::Dependent);
		let cycle = RefreshCycle::new(
			CredentialKind::Dependent,
			config.owner_id.clone(),
			keys,
			Arc::clone(primary.store()),
			config.policy,
			Arc::clone(primary.listeners()),
			primary.cancellation().child_token(),
		);
		let enabled = AtomicBool::new(config.dependent_enabled);

		Self { primary, enabled, cycle }
	}

	/// Returns the ticket, or `None` without touching the store while the broker is disabled.
	///
	/// A refresh first obtains the primary access token through [`TokenBroker::get_token`];
	/// failures there count as a failed ticket refresh.
	pub async fn get_token(&self) -> Result<Option<Credential>> {
		if !self.is_enabled() {
			return Ok(None);
		}

		let span = RefreshSpan::new(CredentialKind::Dependent, "get_token");
		let this = self;

		span.instrument(self.cycle.obtain(move || async move {
			let access_token = this
				.primary
				.get_token()
				.await
				.map_err(|e| RefreshError::Primary(Box::new(e)))?;

			this.primary
				.issuer()
				.issue_ticket(&access_token.value)
				.await
				.map_err(RefreshError::from)
		}))
		.await
		.map(Some)
	}

	/// Fetches the ticket once when enabled.
	pub async fn warm_up(&self) -> Result<()> {
		self.get_token().await.map(|_| ())
	}

	/// Returns `true` while the broker serves tickets.
	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Acquire)
	}

	/// Enables or disables the broker; disabling drops its refresh bookkeeping.
	///
	/// Tickets already in the store are left alone and expire through their TTL.
	pub fn set_enabled(&self, enabled: bool) {
		self.enabled.store(enabled, Ordering::Release);

		if !enabled {
			self.cycle.clear_stamp();
		}
	}

	/// Cancels in-flight poll waits on this broker only.
	pub fn shutdown(&self) {
		self.cycle.cancel.cancel();
	}

	/// Registers a listener on the registry shared with the primary broker.
	pub fn add_listener(&self, listener: impl ChangeListener + 'static) -> ListenerId {
		self.cycle.listeners.add(listener)
	}

	/// Unregisters a listener; returns `false` if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.cycle.listeners.remove(id)
	}

	/// Unregisters every listener, including those added through the primary broker.
	pub fn remove_all_listeners(&self) {
		self.cycle.listeners.clear();
	}

	/// Primary broker the tickets are minted from.
	pub fn primary(&self) -> &Arc<TokenBroker> {
		&self.primary
	}

	/// Store keys holding the ticket and its refresh lock.
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
}
impl Debug for DependentTokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DependentTokenBroker")
			.field("enabled", &self.is_enabled())
			.field("cycle", &self.cycle)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{AppSecret, OwnerId},
		config::BrokerConfig,
		issuer::ScriptedIssuer,
		store::MemoryStore,
	};

	fn brokers(enabled: bool) -> (MemoryStore, Arc<ScriptedIssuer>, DependentTokenBroker) {
		let store = MemoryStore::default();
		let issuer = Arc::new(ScriptedIssuer::new());
		let config = BrokerConfig::builder(
			OwnerId::new("wx-app").expect("Owner fixture should be valid."),
			AppSecret::new("secret"),
		)
		.dependent_enabled(enabled)
		.build()
		.expect("Config fixture should be valid.");
		let primary = TokenBroker::new(config, Arc::new(store.clone()), issuer.clone())
			.expect("Primary broker should build.");

		(store, issuer, DependentTokenBroker::new(Arc::new(primary)))
	}

	#[tokio::test(start_paused = true)]
	async fn disabled_broker_never_touches_store_or_issuer() {
		let (store, issuer, broker) = brokers(false);

		assert!(broker.get_token().await.expect("Disabled lookups should succeed.").is_none());
		assert_eq!(broker.metrics().requests(), 0);
		assert_eq!(issuer.token_calls() + issuer.ticket_calls(), 0);
		assert!(!store.is_locked(&broker.keys().lock));
	}

	#[tokio::test(start_paused = true)]
	async fn ticket_refresh_uses_primary_token() {
		let (store, issuer, broker) = brokers(true);

		issuer.push_token("access-1", None);
		issuer.push_ticket("ticket-1", None);

		let ticket = broker
			.get_token()
			.await
			.expect("Enabled lookups should succeed.")
			.expect("Enabled broker should return a ticket.");

		assert_eq!(ticket.kind, CredentialKind::Dependent);
		assert_eq!(ticket.value.expose(), "ticket-1");
		assert_eq!(issuer.ticket_inputs(), vec!["access-1".to_owned()]);
		assert_eq!(store.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn disabling_drops_the_refresh_stamp() {
		let (_store, issuer, broker) = brokers(true);

		issuer.push_token("access-1", None);
		issuer.push_ticket("ticket-1", None);
		broker.warm_up().await.expect("Warm-up should succeed.");

		assert!(broker.last_refresh().is_some());

		broker.set_enabled(false);

		assert!(!broker.is_enabled());
		assert!(broker.last_refresh().is_none());
		assert!(broker.primary().last_refresh().is_some());
	}
}
