//! Credential values cached in the shared store and the issuer output they are minted from.

// self
use crate::{_prelude::*, auth::TokenSecret, broker::RefreshStamp};

/// Credential kinds served by the brokers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
	/// Access token minted directly from the owner's secret material.
	Primary,
	/// Ticket minted from a valid primary access token.
	Dependent,
}
impl CredentialKind {
	/// Returns a stable label suitable for span, metric, and error fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::Primary => "access_token",
			CredentialKind::Dependent => "ticket",
		}
	}

	/// Returns the segment used when composing store keys.
	pub const fn key_segment(self) -> &'static str {
		match self {
			CredentialKind::Primary => "token",
			CredentialKind::Dependent => "ticket",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Raw issuer output before the broker assigns a store TTL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
	/// Credential value returned by the issuer.
	pub value: TokenSecret,
	/// Lifetime reported by the issuer, if any.
	pub expires_in: Option<Duration>,
}
impl IssuedToken {
	/// Creates an issued token with an optional issuer-reported lifetime.
	pub fn new(value: impl Into<String>, expires_in: Option<Duration>) -> Self {
		Self { value: TokenSecret::new(value), expires_in }
	}
}

/// Credential served by a broker.
///
/// The shared store holds only the raw value; the store's own TTL expires it. `committed` is
/// present only on the value this broker just minted and wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Kind of credential.
	pub kind: CredentialKind,
	/// Opaque credential value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Refresh that committed the value, when this broker minted it.
	pub committed: Option<RefreshStamp>,
}
impl Credential {
	/// Wraps a raw value read back from the shared store.
	pub fn stored(kind: CredentialKind, value: TokenSecret) -> Self {
		Self { kind, value, committed: None }
	}

	/// Wraps a value this broker committed with the provided TTL.
	pub fn minted(
		kind: CredentialKind,
		value: TokenSecret,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Self {
		Self { kind, value, committed: Some(RefreshStamp { refreshed_at: issued_at, ttl }) }
	}

	/// Store TTL the value was committed with, when this broker minted it.
	pub fn ttl(&self) -> Option<Duration> {
		self.committed.map(|stamp| stamp.ttl)
	}

	/// Instant after which the store stops serving the value, when this broker minted it.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.committed.map(|stamp| stamp.refreshed_at + stamp.ttl)
	}
}
