// self
use crate::{_prelude::*, auth::CredentialKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRefresh<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRefresh<F> = F;

/// A span builder used by broker refresh cycles.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the provided credential kind + stage.
	pub fn new(kind: CredentialKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("credential_broker.refresh", kind = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRefresh<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failure that the broker absorbs instead of returning to the caller.
pub(crate) fn warn_absorbed(kind: CredentialKind, stage: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(kind = kind.as_str(), stage, error = %error, "refresh step failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, error);
	}
}

/// Logs a committed refresh; `ttl_secs` is the store TTL the value was written with.
pub(crate) fn info_committed(kind: CredentialKind, owner: &str, ttl_secs: i64) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(kind = kind.as_str(), owner, ttl_secs, "credential refreshed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, owner, ttl_secs);
	}
}

/// Logs a lost lock race; the caller keeps polling for the winner's value.
pub(crate) fn debug_contended(kind: CredentialKind, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(kind = kind.as_str(), attempt, "refresh lock held elsewhere");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt);
	}
}
