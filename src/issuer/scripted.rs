//! Programmable in-process [`Issuer`] for tests; enabled via `cfg(test)` or the `test` crate
//! feature.

// std
use std::{
	collections::VecDeque,
	sync::atomic::{AtomicUsize, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{AppSecret, IssuedToken, OwnerId, TokenSecret},
	error::IssuerError,
	issuer::{Issuer, IssuerFuture},
	store::std_duration,
};

type Script = Mutex<VecDeque<Result<IssuedToken, IssuerError>>>;

/// Issuer that replays queued outcomes in order and counts every call.
///
/// Once a queue runs dry the issuer answers with [`IssuerError::Rejected`] (code `-1`), so an
/// unexpected extra call shows up as a failed refresh instead of a silently reused value.
#[derive(Debug, Default)]
pub struct ScriptedIssuer {
	tokens: Script,
	tickets: Script,
	latency: Duration,
	token_calls: AtomicUsize,
	ticket_calls: AtomicUsize,
	ticket_inputs: Mutex<Vec<String>>,
}
impl ScriptedIssuer {
	/// Creates an issuer with empty scripts.
	pub fn new() -> Self {
		Self::default()
	}

	/// Delays every call by `latency` (driven by the Tokio clock).
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = latency;

		self
	}

	/// Queues a successful access-token response.
	pub fn push_token(&self, value: impl Into<String>, expires_in: Option<Duration>) -> &Self {
		self.tokens.lock().push_back(Ok(IssuedToken::new(value, expires_in)));

		self
	}

	/// Queues a failing access-token response.
	pub fn push_token_error(&self, error: IssuerError) -> &Self {
		self.tokens.lock().push_back(Err(error));

		self
	}

	/// Queues a successful ticket response.
	pub fn push_ticket(&self, value: impl Into<String>, expires_in: Option<Duration>) -> &Self {
		self.tickets.lock().push_back(Ok(IssuedToken::new(value, expires_in)));

		self
	}

	/// Queues a failing ticket response.
	pub fn push_ticket_error(&self, error: IssuerError) -> &Self {
		self.tickets.lock().push_back(Err(error));

		self
	}

	/// Number of access-token calls served so far.
	pub fn token_calls(&self) -> usize {
		self.token_calls.load(Ordering::SeqCst)
	}

	/// Number of ticket calls served so far.
	pub fn ticket_calls(&self) -> usize {
		self.ticket_calls.load(Ordering::SeqCst)
	}

	/// Access tokens the ticket endpoint was called with, in call order.
	pub fn ticket_inputs(&self) -> Vec<String> {
		self.ticket_inputs.lock().clone()
	}

	async fn replay(&self, script: &Script) -> Result<IssuedToken, IssuerError> {
		if self.latency.is_positive() {
			tokio::time::sleep(std_duration(self.latency)).await;
		}

		script.lock().pop_front().unwrap_or_else(|| {
			Err(IssuerError::Rejected { code: -1, message: "script exhausted".into() })
		})
	}
}
impl Issuer for ScriptedIssuer {
	fn issue_access_token<'a>(
		&'a self,
		_owner: &'a OwnerId,
		_secret: &'a AppSecret,
	) -> IssuerFuture<'a, IssuedToken> {
		Box::pin(async move {
			self.token_calls.fetch_add(1, Ordering::SeqCst);

			self.replay(&self.tokens).await
		})
	}

	fn issue_ticket<'a>(&'a self, access_token: &'a TokenSecret) -> IssuerFuture<'a, IssuedToken> {
		Box::pin(async move {
			self.ticket_calls.fetch_add(1, Ordering::SeqCst);
			self.ticket_inputs.lock().push(access_token.expose().to_owned());

			self.replay(&self.tickets).await
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn replays_in_order_then_reports_exhaustion() {
		let issuer = ScriptedIssuer::new();
		let owner = OwnerId::new("wx-app").expect("Owner fixture should be valid.");
		let secret = AppSecret::new("secret");

		issuer.push_token("first", None).push_token_error(IssuerError::HttpStatus { status: 500 });

		let first = issuer
			.issue_access_token(&owner, &secret)
			.await
			.expect("First scripted call should succeed.");

		assert_eq!(first.value.expose(), "first");
		assert!(matches!(
			issuer.issue_access_token(&owner, &secret).await,
			Err(IssuerError::HttpStatus { status: 500 })
		));
		assert!(matches!(
			issuer.issue_access_token(&owner, &secret).await,
			Err(IssuerError::Rejected { code: -1, .. })
		));
		assert_eq!(issuer.token_calls(), 3);
		assert_eq!(issuer.ticket_calls(), 0);
	}

	#[tokio::test]
	async fn records_ticket_inputs() {
		let issuer = ScriptedIssuer::new();

		issuer.push_ticket("ticket-1", Some(Duration::seconds(7_200)));

		let ticket = issuer
			.issue_ticket(&TokenSecret::new("access-1"))
			.await
			.expect("Scripted ticket should succeed.");

		assert_eq!(ticket.value.expose(), "ticket-1");
		assert_eq!(issuer.ticket_inputs(), vec!["access-1".to_owned()]);
	}
}
