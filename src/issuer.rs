//! Credential issuer contract, response decoding, and (behind the `test` feature) the scripted
//! in-process issuer.

pub mod response;
#[cfg(any(test, feature = "test"))] pub mod scripted;

pub use response::*;
#[cfg(any(test, feature = "test"))] pub use scripted::ScriptedIssuer;

// self
use crate::{
	_prelude::*,
	auth::{AppSecret, IssuedToken, OwnerId, TokenSecret},
	error::IssuerError,
};

/// Boxed future returned by [`Issuer`] operations.
pub type IssuerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IssuerError>> + 'a + Send>>;

/// Remote authority that mints fresh credentials.
///
/// Implementations map error-coded or empty responses to [`IssuerError`]; the brokers never
/// retry on their own beyond the bounded lock/poll cycle.
pub trait Issuer
where
	Self: Send + Sync,
{
	/// Exchanges the owner's secret material for a primary access token.
	fn issue_access_token<'a>(
		&'a self,
		owner: &'a OwnerId,
		secret: &'a AppSecret,
	) -> IssuerFuture<'a, IssuedToken>;

	/// Mints a dependent ticket from a valid primary access token.
	fn issue_ticket<'a>(&'a self, access_token: &'a TokenSecret) -> IssuerFuture<'a, IssuedToken>;
}
