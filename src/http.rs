//! HTTP issuer endpoints and the reqwest-backed [`Issuer`] implementation.
//!
//! Issuer URLs carry the owner's secret (token endpoint) or a live access token (ticket
//! endpoint) in their query string, so neither the URLs built here nor the responses are ever
//! logged.

// self
use crate::{
	_prelude::*,
	auth::{AppSecret, OwnerId, TokenSecret},
	error::ConfigError,
};
#[cfg(feature = "reqwest")]
use crate::{
	auth::IssuedToken,
	error::{IssuerError, TransportError},
	issuer::{Issuer, IssuerFuture, IssuerResponse, ValueField},
};

/// Endpoint set used by the HTTP issuer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerEndpoints {
	/// Endpoint exchanging `appid` + `secret` for an access token.
	pub token: Url,
	/// Endpoint exchanging an access token for a ticket.
	pub ticket: Url,
	/// Value of the ticket endpoint's `type` query parameter.
	pub ticket_type: String,
}
impl IssuerEndpoints {
	const DEFAULT_TICKET: &'static str = "https://api.weixin.qq.com/cgi-bin/ticket/getticket";
	const DEFAULT_TOKEN: &'static str = "https://api.weixin.qq.com/cgi-bin/token";

	/// Creates an endpoint set with the default `jsapi` ticket type.
	pub fn new(token: Url, ticket: Url) -> Self {
		Self { token, ticket, ticket_type: "jsapi".into() }
	}

	/// Overrides the ticket type query value.
	pub fn with_ticket_type(mut self, ticket_type: impl Into<String>) -> Self {
		self.ticket_type = ticket_type.into();

		self
	}

	/// Validates endpoint schemes and the ticket type.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("token", &self.token)?;
		validate_endpoint("ticket", &self.ticket)?;

		if self.ticket_type.trim().is_empty() {
			return Err(ConfigError::EmptyTicketType);
		}

		Ok(())
	}

	/// Builds the access-token request URL for the owner's secret material.
	pub fn token_url(&self, owner: &OwnerId, secret: &AppSecret) -> Url {
		let mut url = self.token.clone();

		url.query_pairs_mut()
			.append_pair("grant_type", "client_credential")
			.append_pair("appid", owner)
			.append_pair("secret", secret.expose());

		url
	}

	/// Builds the ticket request URL for a primary access token.
	pub fn ticket_url(&self, access_token: &TokenSecret) -> Url {
		let mut url = self.ticket.clone();

		url.query_pairs_mut()
			.append_pair("access_token", access_token.expose())
			.append_pair("type", &self.ticket_type);

		url
	}
}
impl Default for IssuerEndpoints {
	fn default() -> Self {
		Self::new(
			Url::parse(Self::DEFAULT_TOKEN).expect("Default token endpoint must parse."),
			Url::parse(Self::DEFAULT_TICKET).expect("Default ticket endpoint must parse."),
		)
	}
}

/// [`Issuer`] that calls the configured endpoints with reqwest.
///
/// Issuer endpoints answer directly, so a custom [`ReqwestClient`] should keep redirects
/// disabled and configure its own timeouts; the broker adds no transport retries.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestIssuer {
	client: ReqwestClient,
	endpoints: IssuerEndpoints,
}
#[cfg(feature = "reqwest")]
impl ReqwestIssuer {
	/// Builds an issuer with a default reqwest client.
	pub fn new(endpoints: IssuerEndpoints) -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Self::with_client(client, endpoints)
	}

	/// Builds an issuer around an existing reqwest client.
	pub fn with_client(
		client: ReqwestClient,
		endpoints: IssuerEndpoints,
	) -> Result<Self, ConfigError> {
		endpoints.validate()?;

		Ok(Self { client, endpoints })
	}

	/// Endpoint set this issuer calls.
	pub fn endpoints(&self) -> &IssuerEndpoints {
		&self.endpoints
	}

	async fn fetch(&self, url: Url, field: ValueField) -> Result<IssuedToken, IssuerError> {
		let response = self.client.get(url).send().await.map_err(TransportError::from)?;
		let status = response.status();

		if !status.is_success() {
			return Err(IssuerError::HttpStatus { status: status.as_u16() });
		}

		let bytes = response.bytes().await.map_err(TransportError::from)?;

		IssuerResponse::parse(&bytes)?.into_issued(field)
	}
}
#[cfg(feature = "reqwest")]
impl Issuer for ReqwestIssuer {
	fn issue_access_token<'a>(
		&'a self,
		owner: &'a OwnerId,
		secret: &'a AppSecret,
	) -> IssuerFuture<'a, IssuedToken> {
		Box::pin(self.fetch(self.endpoints.token_url(owner, secret), ValueField::AccessToken))
	}

	fn issue_ticket<'a>(&'a self, access_token: &'a TokenSecret) -> IssuerFuture<'a, IssuedToken> {
		Box::pin(self.fetch(self.endpoints.ticket_url(access_token), ValueField::Ticket))
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(ConfigError::InvalidEndpoint { endpoint: name, url: url.to_string() }),
	}
}
