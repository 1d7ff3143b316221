//! Broker-level error types shared across brokers, issuers, and stores.
//!
//! Callers of `get_token` only ever observe [`Error::RefreshFailure`]; issuer and store
//! failures are logged at the refresh step as [`RefreshError`] and folded into the
//! terminal failure once every lock/poll attempt is exhausted.

// self
use crate::{_prelude::*, auth::CredentialKind};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No credential could be observed after every refresh attempt.
	#[error("{kind} unavailable after refresh attempt: {reason}.")]
	RefreshFailure {
		/// Credential kind the caller asked for.
		kind: CredentialKind,
		/// Why the broker gave up.
		reason: FailureReason,
	},
}
impl Error {
	/// Returns `true` when the failure was caused by broker shutdown.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::RefreshFailure { reason: FailureReason::Cancelled, .. })
	}
}

/// Terminal reasons attached to [`Error::RefreshFailure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
	/// Every lock/poll attempt finished without a credential appearing in the store.
	Exhausted {
		/// Number of lock attempts performed.
		attempts: u32,
	},
	/// The broker was shut down while the caller was waiting.
	Cancelled,
}
impl Display for FailureReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Exhausted { attempts } =>
				write!(f, "store still empty after {attempts} lock attempt(s)"),
			Self::Cancelled => f.write_str("wait cancelled by shutdown"),
		}
	}
}

/// Configuration and validation failures raised while assembling brokers.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Owner identifier or namespace failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Secret material is empty.
	#[error("Secret material cannot be empty.")]
	EmptySecret,
	/// Refresh policy contains an unusable value.
	#[error("Refresh policy field `{field}` is invalid: {reason}.")]
	InvalidPolicy {
		/// Offending policy field.
		field: &'static str,
		/// Human-readable constraint that was violated.
		reason: &'static str,
	},
	/// Issuer endpoint uses an unsupported scheme.
	#[error("The {endpoint} endpoint must use HTTP(S): {url}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Ticket type query value is empty.
	#[error("Ticket type cannot be empty.")]
	EmptyTicketType,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported by a credential issuer.
#[derive(Debug, ThisError)]
pub enum IssuerError {
	/// Issuer answered with a non-zero error code.
	#[error("Issuer rejected the request with errcode {code}: {message}.")]
	Rejected {
		/// Issuer-supplied error code.
		code: i64,
		/// Issuer-supplied error message.
		message: String,
	},
	/// Issuer answered successfully but without a credential value.
	#[error("Issuer returned an empty credential value (errcode {code}: {message}).")]
	EmptyValue {
		/// Issuer-supplied error code.
		code: i64,
		/// Issuer-supplied error message.
		message: String,
	},
	/// Issuer answered with a non-success HTTP status.
	#[error("Issuer responded with HTTP status {status}.")]
	HttpStatus {
		/// HTTP status code.
		status: u16,
	},
	/// Issuer responded with malformed JSON.
	#[error("Issuer returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Network or IO failure while calling the issuer.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the issuer.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failure of a single refresh step; logged by the broker, never returned to callers.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Issuer call failed.
	#[error(transparent)]
	Issuer(#[from] IssuerError),
	/// Writing the fresh credential into the store failed.
	#[error(transparent)]
	Store(#[from] crate::store::StoreError),
	/// The primary credential needed to mint a dependent credential was unavailable.
	#[error("Primary credential unavailable: {0}")]
	Primary(#[source] Box<Error>),
}
