//! Stampede-safe brokers for the primary access token and the ticket derived from it.
//!
//! Both brokers run the same cycle: serve the stored credential when present, otherwise race
//! for the store lock, let the winner call the issuer once, and have everyone else poll the
//! store until the winner's value lands. The cycle is bounded by
//! [`RefreshPolicy::max_lock_attempts`](crate::config::RefreshPolicy::max_lock_attempts);
//! running out of attempts yields [`Error::RefreshFailure`].

mod cycle;
mod dependent;
mod metrics;
mod primary;

pub use dependent::DependentTokenBroker;
pub use metrics::BrokerMetrics;
pub use primary::TokenBroker;

// self
use crate::_prelude::*;

/// Bookkeeping for the latest refresh started by one broker.
///
/// The stamp is set when a refresh begins and restored to its previous value when the refresh
/// fails, so it only ever describes a refresh that either is in flight or committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshStamp {
	/// Instant the refresh started.
	pub refreshed_at: OffsetDateTime,
	/// Store TTL of the committed value (the policy fallback while the refresh is in flight).
	pub ttl: Duration,
}
