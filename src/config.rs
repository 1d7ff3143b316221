//! Broker configuration: owner identity, secret material, key namespace, and refresh policy.

// self
use crate::{
	_prelude::*,
	auth::{AppSecret, Namespace, OwnerId},
	error::ConfigError,
};

/// How long a freshly minted credential stays in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TtlPolicy {
	/// Always commit with the same TTL.
	Fixed {
		/// TTL applied to every committed credential.
		#[serde(rename = "ttl_secs", with = "seconds")]
		ttl: Duration,
	},
	/// Commit with the issuer-reported lifetime minus a safety margin.
	IssuerExpiryMinus {
		/// Margin subtracted from the issuer-reported lifetime.
		#[serde(rename = "margin_secs", with = "seconds")]
		margin: Duration,
		/// TTL used when the issuer omits its lifetime.
		#[serde(rename = "fallback_secs", with = "seconds")]
		fallback: Duration,
	},
}
impl TtlPolicy {
	/// Fixed TTL used when none is configured (issuer lifetime 7200s minus 100s).
	pub const DEFAULT_TTL: Duration = Duration::seconds(7_100);

	/// Resolves the store TTL for a credential with the provided issuer lifetime.
	pub fn resolve(&self, expires_in: Option<Duration>) -> Duration {
		match *self {
			Self::Fixed { ttl } => ttl,
			Self::IssuerExpiryMinus { margin, fallback } => match expires_in {
				Some(lifetime) => (lifetime - margin).max(Duration::SECOND),
				None => fallback,
			},
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let ttl_positive = match *self {
			Self::Fixed { ttl } => ttl.is_positive(),
			Self::IssuerExpiryMinus { margin, fallback } =>
				!margin.is_negative() && fallback.is_positive(),
		};

		if ttl_positive {
			Ok(())
		} else {
			Err(ConfigError::InvalidPolicy { field: "ttl", reason: "TTLs must be positive" })
		}
	}
}
impl Default for TtlPolicy {
	fn default() -> Self {
		Self::Fixed { ttl: Self::DEFAULT_TTL }
	}
}

/// Timing knobs for the lock/poll refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
	/// How long a lock attempt may wait for a busy lock (zero: a single attempt).
	#[serde(rename = "lock_wait_ms", with = "milliseconds")]
	pub lock_wait: Duration,
	/// How long an acquired lock stays held before it expires on its own.
	#[serde(rename = "lock_hold_ms", with = "milliseconds")]
	pub lock_hold: Duration,
	/// Delay between store reads while waiting for another refresher.
	#[serde(rename = "poll_interval_ms", with = "milliseconds")]
	pub poll_interval: Duration,
	/// Total time spent polling after a lock attempt.
	#[serde(rename = "poll_window_ms", with = "milliseconds")]
	pub poll_window: Duration,
	/// Lock attempts per `get_token` call; every attempt but the last is followed by a poll
	/// window, the last by a single store read.
	pub max_lock_attempts: u32,
	/// TTL assigned to committed credentials.
	pub ttl: TtlPolicy,
}
impl RefreshPolicy {
	/// Validates the policy's invariants.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.lock_wait.is_negative() {
			return Err(ConfigError::InvalidPolicy {
				field: "lock_wait",
				reason: "must not be negative",
			});
		}
		if !self.lock_hold.is_positive() {
			return Err(ConfigError::InvalidPolicy {
				field: "lock_hold",
				reason: "must be positive",
			});
		}
		if !self.poll_interval.is_positive() {
			return Err(ConfigError::InvalidPolicy {
				field: "poll_interval",
				reason: "must be positive",
			});
		}
		if self.poll_window.is_negative() {
			return Err(ConfigError::InvalidPolicy {
				field: "poll_window",
				reason: "must not be negative",
			});
		}
		if self.max_lock_attempts == 0 {
			return Err(ConfigError::InvalidPolicy {
				field: "max_lock_attempts",
				reason: "at least one attempt is required",
			});
		}

		self.ttl.validate()
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			lock_wait: Duration::ZERO,
			lock_hold: Duration::seconds(3),
			poll_interval: Duration::milliseconds(300),
			poll_window: Duration::seconds(4),
			max_lock_attempts: 2,
			ttl: TtlPolicy::default(),
		}
	}
}

/// Immutable broker configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Owner (tenant/app) the credentials belong to.
	pub owner_id: OwnerId,
	/// Secret material exchanged for access tokens.
	pub secret: AppSecret,
	/// Initial state of the dependent broker's enabled flag.
	#[serde(default)]
	pub dependent_enabled: bool,
	/// Prefix for every store key.
	#[serde(default = "BrokerConfig::default_namespace")]
	pub namespace: Namespace,
	/// Lock/poll timings and TTL policy.
	#[serde(default)]
	pub policy: RefreshPolicy,
}
impl BrokerConfig {
	/// Namespace applied when none is configured.
	pub const DEFAULT_NAMESPACE: &'static str = "credential_broker";

	/// Creates a new builder for the provided owner and secret.
	pub fn builder(owner_id: OwnerId, secret: AppSecret) -> BrokerConfigBuilder {
		BrokerConfigBuilder::new(owner_id, secret)
	}

	/// Validates the secret and refresh policy; useful after deserializing a config file.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.secret.expose().trim().is_empty() {
			return Err(ConfigError::EmptySecret);
		}

		self.policy.validate()
	}

	fn default_namespace() -> Namespace {
		Namespace::new(Self::DEFAULT_NAMESPACE).expect("Default namespace must be valid.")
	}
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	/// Owner the credentials belong to.
	pub owner_id: OwnerId,
	/// Secret material exchanged for access tokens.
	pub secret: AppSecret,
	/// Initial dependent-broker flag.
	pub dependent_enabled: bool,
	/// Optional namespace override.
	pub namespace: Option<Namespace>,
	/// Refresh policy.
	pub policy: RefreshPolicy,
}
impl BrokerConfigBuilder {
	/// Creates a builder with default namespace and policy, dependent broker disabled.
	pub fn new(owner_id: OwnerId, secret: AppSecret) -> Self {
		Self {
			owner_id,
			secret,
			dependent_enabled: false,
			namespace: None,
			policy: RefreshPolicy::default(),
		}
	}

	/// Enables or disables the dependent broker initially.
	pub fn dependent_enabled(mut self, enabled: bool) -> Self {
		self.dependent_enabled = enabled;

		self
	}

	/// Overrides the store key namespace.
	pub fn namespace(mut self, namespace: Namespace) -> Self {
		self.namespace = Some(namespace);

		self
	}

	/// Overrides the refresh policy.
	pub fn policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let config = BrokerConfig {
			owner_id: self.owner_id,
			secret: self.secret,
			dependent_enabled: self.dependent_enabled,
			namespace: self.namespace.unwrap_or_else(BrokerConfig::default_namespace),
			policy: self.policy,
		};

		config.validate()?;

		Ok(config)
	}
}

mod seconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

mod milliseconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let millis = i64::try_from(value.whole_milliseconds()).unwrap_or(i64::MAX);

		serializer.serialize_i64(millis)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}
