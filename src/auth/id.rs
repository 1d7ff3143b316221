//! Owner and namespace identifiers that end up inside shared store keys.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

/// Separator joining the segments of a store key; identifiers may not contain it.
pub const KEY_SEPARATOR: char = ':';

const IDENTIFIER_MAX_LEN: usize = 128;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Wraps `value` once it is usable as a store key segment.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check_segment($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

def_id! { OwnerId, "Appid of the owner whose credentials a broker serves.", "Owner" }
def_id! { Namespace, "Leading store key segment that partitions brokers sharing one store.", "Namespace" }

/// Reasons an owner or namespace cannot be used as a store key segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Empty segments would collapse two keys into one.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// `Owner` or `Namespace`.
		kind: &'static str,
	},
	/// Whitespace is rejected anywhere in the identifier.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// `Owner` or `Namespace`.
		kind: &'static str,
	},
	/// The identifier contains the store key separator.
	#[error("{kind} identifier contains the key separator '{separator}'.")]
	ContainsSeparator {
		/// `Owner` or `Namespace`.
		kind: &'static str,
		/// Rejected separator character.
		separator: char,
	},
	/// The identifier is longer than a key segment may be.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// `Owner` or `Namespace`.
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

fn check_segment(kind: &'static str, segment: &str) -> Result<(), IdentifierError> {
	if segment.is_empty() {
		Err(IdentifierError::Empty { kind })
	} else if segment.chars().any(char::is_whitespace) {
		Err(IdentifierError::ContainsWhitespace { kind })
	} else if segment.contains(KEY_SEPARATOR) {
		Err(IdentifierError::ContainsSeparator { kind, separator: KEY_SEPARATOR })
	} else if segment.len() > IDENTIFIER_MAX_LEN {
		Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn segments_reject_blank_spaced_and_separated_values() {
		assert!(matches!(OwnerId::new(""), Err(IdentifierError::Empty { kind: "Owner" })));
		assert!(matches!(
			OwnerId::new(format!("wx{}app", '\u{00A0}')),
			Err(IdentifierError::ContainsWhitespace { .. })
		));
		assert!(matches!(
			Namespace::new("tenant:a"),
			Err(IdentifierError::ContainsSeparator { kind: "Namespace", separator: ':' })
		));
		assert!(matches!(
			Namespace::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN, .. })
		));

		Namespace::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		let owner = OwnerId::new("wx4f0e2a").expect("Owner fixture should be considered valid.");

		assert_eq!(&*owner, "wx4f0e2a");
		assert_eq!(format!("{owner:?}"), "Owner(wx4f0e2a)");
	}

	#[test]
	fn deserialization_runs_the_same_checks() {
		let owner: OwnerId =
			serde_json::from_str("\"wx-42\"").expect("Owner should deserialize successfully.");

		assert_eq!(owner.as_ref(), "wx-42");
		assert!(serde_json::from_str::<OwnerId>("\"wx 42\"").is_err());
		assert!(serde_json::from_str::<Namespace>("\"a:b\"").is_err());
		assert_eq!(serde_json::to_string(&owner).expect("Owner should serialize."), "\"wx-42\"");
	}
}
