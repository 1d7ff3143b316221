// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use parking_lot::Mutex;
use time::Duration;
use tokio::time::Instant;
// self
use credential_broker::{
	auth::{AppSecret, CredentialKind, OwnerId},
	broker::TokenBroker,
	config::{BrokerConfig, RefreshPolicy, TtlPolicy},
	error::{Error, FailureReason, IssuerError},
	issuer::ScriptedIssuer,
	notice::ChangeNotice,
	store::{MemoryStore, SharedStore},
};

fn config(policy: RefreshPolicy) -> BrokerConfig {
	BrokerConfig::builder(
		OwnerId::new("wx-app").expect("Owner fixture should be valid for broker tests."),
		AppSecret::new("app-secret"),
	)
	.policy(policy)
	.build()
	.expect("Broker config fixture should build successfully.")
}

fn build_broker(store: &MemoryStore, issuer: &Arc<ScriptedIssuer>) -> Arc<TokenBroker> {
	build_broker_with(store, issuer, RefreshPolicy::default())
}

fn build_broker_with(
	store: &MemoryStore,
	issuer: &Arc<ScriptedIssuer>,
	policy: RefreshPolicy,
) -> Arc<TokenBroker> {
	let broker = TokenBroker::new(config(policy), Arc::new(store.clone()), issuer.clone())
		.expect("Token broker should build from valid fixtures.");

	Arc::new(broker)
}

async fn hold_lock(store: &MemoryStore, broker: &TokenBroker, hold: Duration) {
	let acquired = store
		.try_lock(&broker.keys().lock, Duration::ZERO, hold)
		.await
		.expect("Memory store locks should not fail.");

	assert!(acquired, "Free lock should be acquired by the simulated peer.");
}

async fn stored_value(store: &MemoryStore, broker: &TokenBroker) -> Option<String> {
	store.get(&broker.keys().value).await.expect("Memory store reads should not fail.")
}

#[tokio::test(start_paused = true)]
async fn refresh_commits_issuer_value_with_default_ttl() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	issuer.push_token("abc", Some(Duration::seconds(7_200)));

	let token = broker.get_token().await.expect("Refresh should succeed when the lock is free.");

	assert_eq!(token.kind, CredentialKind::Primary);
	assert_eq!(token.value.expose(), "abc");
	assert_eq!(stored_value(&store, &broker).await.as_deref(), Some("abc"));
	assert_eq!(store.ttl_of(&broker.keys().value), Some(Duration::seconds(7_100)));
	assert_eq!(issuer.token_calls(), 1);
	assert_eq!(broker.metrics().locks_acquired(), 1);
	assert_eq!(broker.metrics().refresh_successes(), 1);

	let again = broker.get_token().await.expect("Stored token should be served.");

	assert_eq!(again.value.expose(), "abc");
	assert_eq!(issuer.token_calls(), 1);
	assert_eq!(broker.metrics().cache_hits(), 1);
}

#[tokio::test(start_paused = true)]
async fn contended_caller_picks_up_value_written_by_lock_holder() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	hold_lock(&store, &broker, Duration::seconds(3)).await;

	let started = Instant::now();
	let writer = async {
		tokio::time::sleep(StdDuration::from_millis(500)).await;
		store
			.set(&broker.keys().value, "xyz".into(), Duration::seconds(7_100))
			.await
			.expect("Peer write should succeed.");
	};
	let (token, ()) = tokio::join!(broker.get_token(), writer);
	let token = token.expect("Waiting caller should observe the peer's value.");

	assert_eq!(token.value.expose(), "xyz");
	assert_eq!(token.committed, None);
	assert!(started.elapsed() < StdDuration::from_secs(1));
	assert_eq!(issuer.token_calls(), 0);
	assert_eq!(stored_value(&store, &broker).await.as_deref(), Some("xyz"));
	assert_eq!(broker.metrics().locks_contended(), 1);
	assert_eq!(broker.metrics().cache_hits(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_lock_attempt_refreshes_after_peer_lock_expires() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	// The peer took the lock and crashed without writing.
	hold_lock(&store, &broker, Duration::seconds(3)).await;
	issuer.push_token("late", None);

	let started = Instant::now();
	let token = broker.get_token().await.expect("Second lock attempt should refresh.");

	assert_eq!(token.value.expose(), "late");
	assert!(started.elapsed() >= StdDuration::from_secs(4));
	assert_eq!(issuer.token_calls(), 1);
	assert_eq!(broker.metrics().locks_contended(), 1);
	assert_eq!(broker.metrics().locks_acquired(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_when_lock_outlives_every_attempt() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	hold_lock(&store, &broker, Duration::minutes(1)).await;

	let err = broker.get_token().await.expect_err("No value can appear while the lock is held.");

	assert!(matches!(
		err,
		Error::RefreshFailure {
			kind: CredentialKind::Primary,
			reason: FailureReason::Exhausted { attempts: 2 }
		}
	));
	assert!(err.to_string().starts_with("access_token unavailable after refresh attempt"));
	assert_eq!(issuer.token_calls(), 0);
	assert_eq!(broker.metrics().exhausted(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_or_failed_issuer_responses_are_never_written() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	issuer.push_token("", None);
	issuer
		.push_token_error(IssuerError::Rejected { code: 40_013, message: "invalid appid".into() });

	let err = broker.get_token().await.expect_err("Unusable issuer responses should fail.");

	assert!(matches!(err, Error::RefreshFailure { reason: FailureReason::Exhausted { .. }, .. }));
	assert_eq!(issuer.token_calls(), 2);
	assert_eq!(stored_value(&store, &broker).await, None);
	assert_eq!(broker.metrics().refresh_failures(), 2);
	assert_eq!(broker.last_refresh(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_refresh() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new().with_latency(Duration::milliseconds(200)));
	let broker = build_broker(&store, &issuer);

	issuer.push_token("shared", None);

	let handles = (0..16)
		.map(|_| {
			let broker = Arc::clone(&broker);

			tokio::spawn(async move { broker.get_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Every caller should observe the shared token.");

		assert_eq!(token.value.expose(), "shared");
	}

	assert_eq!(issuer.token_calls(), 1);
	assert_eq!(broker.metrics().requests(), 16);
	assert_eq!(broker.metrics().locks_acquired(), 1);
}

#[tokio::test(start_paused = true)]
async fn brokers_sharing_a_store_refresh_once() {
	let store = MemoryStore::default();
	let first_issuer = Arc::new(ScriptedIssuer::new().with_latency(Duration::milliseconds(100)));
	let second_issuer = Arc::new(ScriptedIssuer::new().with_latency(Duration::milliseconds(100)));
	let first = build_broker(&store, &first_issuer);
	let second = build_broker(&store, &second_issuer);

	first_issuer.push_token("from-first", None);
	second_issuer.push_token("from-second", None);

	let (a, b) = tokio::join!(first.get_token(), second.get_token());
	let a = a.expect("First process should obtain a token.");
	let b = b.expect("Second process should obtain a token.");

	assert_eq!(a.value, b.value);
	assert_eq!(first_issuer.token_calls() + second_issuer.token_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_value_is_refreshed_and_announced() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);
	let notices = Arc::new(Mutex::new(Vec::<ChangeNotice>::new()));
	let sink = Arc::clone(&notices);
	let listener =
		broker.add_listener(move |notice: &ChangeNotice| sink.lock().push(notice.clone()));

	issuer.push_token("first", None);
	issuer.push_token("second", None);
	broker.warm_up().await.expect("Warm-up should refresh the token.");
	tokio::time::advance(StdDuration::from_secs(7_100)).await;

	let token = broker.get_token().await.expect("Expired token should be refreshed.");

	assert_eq!(token.value.expose(), "second");
	assert_eq!(issuer.token_calls(), 2);

	{
		let notices = notices.lock();

		assert_eq!(notices.len(), 2);
		assert!(notices.iter().all(|notice| notice.kind == CredentialKind::Primary));
		assert_eq!(notices[0].owner_id.as_ref(), "wx-app");
		assert_eq!(notices[1].new_value.expose(), "second");
	}

	assert!(broker.remove_listener(listener));
	tokio::time::advance(StdDuration::from_secs(7_100)).await;
	issuer.push_token("third", None);
	broker.get_token().await.expect("Third refresh should succeed.");

	assert_eq!(notices.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn issuer_expiry_policy_shortens_store_ttl() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let policy = RefreshPolicy {
		ttl: TtlPolicy::IssuerExpiryMinus {
			margin: Duration::seconds(100),
			fallback: Duration::seconds(600),
		},
		..Default::default()
	};
	let broker = build_broker_with(&store, &issuer, policy);

	issuer.push_token("short-lived", Some(Duration::seconds(300)));

	let token = broker.get_token().await.expect("Refresh should succeed.");

	assert_eq!(token.ttl(), Some(Duration::seconds(200)));
	assert_eq!(store.ttl_of(&broker.keys().value), Some(Duration::seconds(200)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_poll() {
	let store = MemoryStore::default();
	let issuer = Arc::new(ScriptedIssuer::new());
	let broker = build_broker(&store, &issuer);

	hold_lock(&store, &broker, Duration::minutes(1)).await;

	let stopper = async {
		tokio::time::sleep(StdDuration::from_secs(1)).await;
		broker.shutdown();
	};
	let (result, ()) = tokio::join!(broker.get_token(), stopper);
	let err = result.expect_err("Shutdown should interrupt the wait.");

	assert!(err.is_cancelled());
	assert!(matches!(err, Error::RefreshFailure { reason: FailureReason::Cancelled, .. }));
}
