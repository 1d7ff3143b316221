//! Optional observability helpers for broker refresh cycles.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credential_broker.refresh` with the `kind`
//!   (credential) and `stage` (call site) fields, plus events for refresh failures and store
//!   errors. Credential values and secrets are never recorded.
//! - Enable `metrics` to increment the `credential_broker_refresh_total` counter for every
//!   outcome, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each refresh cycle step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry to `get_token`.
	Attempt,
	/// Credential served straight from the store.
	Hit,
	/// This process minted and committed a fresh credential.
	Refreshed,
	/// A refresh step failed (issuer, store, or primary credential).
	Failure,
	/// Every lock/poll attempt finished without a credential.
	Exhausted,
	/// The wait was cancelled by shutdown.
	Cancelled,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Hit => "hit",
			RefreshOutcome::Refreshed => "refreshed",
			RefreshOutcome::Failure => "failure",
			RefreshOutcome::Exhausted => "exhausted",
			RefreshOutcome::Cancelled => "cancelled",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
