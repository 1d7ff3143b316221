//! Issuer JSON payload decoding shared by every transport.

// self
use crate::{_prelude::*, auth::IssuedToken, error::IssuerError};

/// Field of the issuer payload carrying the credential value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueField {
	/// `access_token`, returned by the token endpoint.
	AccessToken,
	/// `ticket`, returned by the ticket endpoint.
	Ticket,
}

/// Decoded issuer payload: `{access_token | ticket, expires_in, errcode, errmsg}`.
#[derive(Clone, Default, Deserialize)]
pub struct IssuerResponse {
	/// Access token value (token endpoint).
	#[serde(default)]
	pub access_token: Option<String>,
	/// Ticket value (ticket endpoint).
	#[serde(default)]
	pub ticket: Option<String>,
	/// Issuer-reported lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Issuer error code; zero means success.
	#[serde(default)]
	pub errcode: i64,
	/// Issuer error message.
	#[serde(default)]
	pub errmsg: Option<String>,
}
impl IssuerResponse {
	/// Parses an issuer payload, reporting the failing JSON path on malformed input.
	pub fn parse(bytes: &[u8]) -> Result<Self, IssuerError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| IssuerError::ResponseParse { source })
	}

	/// Converts the payload into an [`IssuedToken`], rejecting error codes and empty values.
	pub fn into_issued(self, field: ValueField) -> Result<IssuedToken, IssuerError> {
		let message = self.errmsg.unwrap_or_default();

		if self.errcode != 0 {
			return Err(IssuerError::Rejected { code: self.errcode, message });
		}

		let value = match field {
			ValueField::AccessToken => self.access_token,
			ValueField::Ticket => self.ticket,
		}
		.filter(|value| !value.trim().is_empty())
		.ok_or(IssuerError::EmptyValue { code: self.errcode, message })?;
		let expires_in = self.expires_in.filter(|secs| *secs > 0).map(Duration::seconds);

		Ok(IssuedToken::new(value, expires_in))
	}
}
impl Debug for IssuerResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuerResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("ticket", &self.ticket.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("errcode", &self.errcode)
			.field("errmsg", &self.errmsg)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_payload_maps_to_issued_token() {
		let issued = IssuerResponse::parse(br#"{"access_token":"abc","expires_in":7200}"#)
			.expect("Token payload should parse.")
			.into_issued(ValueField::AccessToken)
			.expect("Token payload should carry a value.");

		assert_eq!(issued.value.expose(), "abc");
		assert_eq!(issued.expires_in, Some(Duration::seconds(7_200)));
	}

	#[test]
	fn ticket_payload_reads_ticket_field() {
		let issued = IssuerResponse::parse(
			br#"{"errcode":0,"errmsg":"ok","ticket":"t-1","expires_in":7200}"#,
		)
		.expect("Ticket payload should parse.")
		.into_issued(ValueField::Ticket)
		.expect("Ticket payload should carry a value.");

		assert_eq!(issued.value.expose(), "t-1");
	}

	#[test]
	fn error_codes_and_empty_values_are_rejected() {
		let err = IssuerResponse::parse(br#"{"errcode":40013,"errmsg":"invalid appid"}"#)
			.expect("Error payload should parse.")
			.into_issued(ValueField::AccessToken)
			.expect_err("Non-zero errcode must be rejected.");

		assert!(matches!(err, IssuerError::Rejected { code: 40013, .. }));
		assert!(err.to_string().contains("invalid appid"));

		let err = IssuerResponse::parse(br#"{"access_token":"","expires_in":7200}"#)
			.expect("Empty payload should parse.")
			.into_issued(ValueField::AccessToken)
			.expect_err("Empty values must be rejected.");

		assert!(matches!(err, IssuerError::EmptyValue { code: 0, .. }));

		let err = IssuerResponse::parse(br#"{"access_token":"abc"}"#)
			.expect("Token payload should parse.")
			.into_issued(ValueField::Ticket)
			.expect_err("Reading the wrong field must be treated as empty.");

		assert!(matches!(err, IssuerError::EmptyValue { .. }));
	}

	#[test]
	fn malformed_json_reports_path() {
		let err = IssuerResponse::parse(br#"{"errcode":"nope"}"#)
			.expect_err("Mistyped errcode must fail to parse.");

		match err {
			IssuerError::ResponseParse { source } => assert_eq!(source.path().to_string(), "errcode"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn debug_redacts_values() {
		let response = IssuerResponse { access_token: Some("abc".into()), ..Default::default() };

		assert!(!format!("{response:?}").contains("abc"));
	}
}
