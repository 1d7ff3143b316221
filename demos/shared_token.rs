//! Demonstrates two brokers (standing in for two processes) sharing one file-backed store: only
//! one of them calls the issuer, and both observe the same access token and ticket.

// std
use std::{env, process, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use credential_broker::{
	auth::{AppSecret, OwnerId},
	broker::{DependentTokenBroker, TokenBroker},
	config::BrokerConfig,
	http::IssuerEndpoints,
	notice::ChangeNotice,
	store::{FileStore, SharedStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"expires_in\":7200}");
		})
		.await;
	let ticket_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/ticket/getticket");
			then.status(200).header("content-type", "application/json").body(
				"{\"errcode\":0,\"errmsg\":\"ok\",\"ticket\":\"demo-ticket\",\"expires_in\":7200}",
			);
		})
		.await;
	let endpoints = IssuerEndpoints::new(
		Url::parse(&server.url("/cgi-bin/token"))?,
		Url::parse(&server.url("/cgi-bin/ticket/getticket"))?,
	);
	let root = env::temp_dir().join(format!("credential_broker_demo_{}", process::id()));
	let store: Arc<dyn SharedStore> = Arc::new(FileStore::open(&root)?);
	let config = BrokerConfig::builder(OwnerId::new("wx-demo-app")?, AppSecret::new("demo-secret"))
		.dependent_enabled(true)
		.build()?;
	let mut processes = Vec::new();

	for name in ["process-a", "process-b"] {
		let primary = Arc::new(TokenBroker::with_reqwest(
			config.clone(),
			Arc::clone(&store),
			endpoints.clone(),
		)?);

		primary.add_listener(move |notice: &ChangeNotice| {
			println!("{name} refreshed the {} for {}.", notice.kind, notice.owner_id);
		});
		processes.push(DependentTokenBroker::new(primary));
	}

	let (a, b) = tokio::join!(processes[0].get_token(), processes[1].get_token());
	let (a, b) = (a?, b?);

	for (name, ticket) in [("process-a", a), ("process-b", b)] {
		if let Some(ticket) = ticket {
			let source = match ticket.ttl() {
				Some(ttl) => format!("minted, ttl {}s", ttl.whole_seconds()),
				None => "read from the store".to_owned(),
			};

			println!("{name} sees ticket {} ({source}).", ticket.value.expose());
		}
	}

	token_mock.assert_async().await;
	ticket_mock.assert_async().await;

	std::fs::remove_dir_all(&root)?;

	Ok(())
}
