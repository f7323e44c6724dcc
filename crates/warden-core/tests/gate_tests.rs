//! Gate tests
//!
//! Drives the gate against a running engine with synthetic downstream handlers.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use warden_core::{NotifyThresholds, StrikeOutcome};
use warden_types::types::ClientId;

#[tokio::test]
async fn test_repeated_not_found_blacklists_on_fourth() {
	let (engine, lines) = common::engine();
	let gate = engine.gate();
	let client = ClientId::from("A");

	for n in 1..=4 {
		let res = gate.intercept(&client, "/missing", || async { StatusCode::NOT_FOUND }).await;
		assert_eq!(res, Ok(StatusCode::NOT_FOUND));

		let snapshot = engine.stats().snapshot().await.unwrap();
		assert_eq!(snapshot.not_found, n);
		let allowed = engine.membership().check(&client).await.unwrap();
		assert_eq!(allowed, n < 4, "after request {}", n);
	}

	// Only the promotion is announced for the fourth request
	let lines = lines.lock().clone();
	assert_eq!(lines.len(), 4);
	assert!(lines[3].starts_with("IP address A was blacklisted"));
	assert!(lines[3].ends_with("1 address(es) on the blacklist"));

	let calls = AtomicUsize::new(0);
	let res = gate
		.intercept(&client, "/", || async {
			calls.fetch_add(1, Ordering::SeqCst);
			StatusCode::OK
		})
		.await;
	let rejection = res.unwrap_err();
	assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
	assert_eq!(rejection.client, client);
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let snapshot = engine.stats().snapshot().await.unwrap();
	assert_eq!(snapshot.forbidden, 1);
	assert_eq!(snapshot.ok, 0);
}

#[tokio::test]
async fn test_hostile_prefix_strikes_whitelisted_client() {
	let (mut builder, lines) = common::builder();
	let engine = builder.whitelist(["B"]).start().unwrap();
	let gate = engine.gate();
	let client = ClientId::from("B");

	let calls = AtomicUsize::new(0);
	let res = gate
		.intercept(&client, "http://evil", || async {
			calls.fetch_add(1, Ordering::SeqCst);
			StatusCode::OK
		})
		.await;
	assert!(res.is_err());
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	let status = engine.membership().inspect(&client).await.unwrap();
	assert_eq!(status.strikes, 1);
	assert!(status.whitelisted);

	let res = gate.intercept(&client, "/", || async { StatusCode::OK }).await;
	assert_eq!(res, Ok(StatusCode::OK));

	let snapshot = engine.stats().snapshot().await.unwrap();
	assert_eq!(snapshot.forbidden, 1);
	assert_eq!(snapshot.ok, 1);
	assert_eq!(
		*lines.lock(),
		vec!["IP address B received a strike: invalid request prefix in URI \"http://evil\""]
	);
}

#[tokio::test]
async fn test_hostile_prefix_one_strike_per_request() {
	let (engine, _lines) = common::engine();
	let gate = engine.gate();
	let client = ClientId::from("198.51.100.4");

	for (n, target) in ["https://a.example/", "http:x", "https:"].iter().enumerate() {
		assert!(gate.intercept(&client, target, || async { StatusCode::OK }).await.is_err());
		engine.stats().snapshot().await.unwrap();
		let strikes = engine.membership().inspect(&client).await.unwrap().strikes;
		assert_eq!(strikes as usize, n + 1);
	}
}

#[tokio::test]
async fn test_whitelisted_client_stays_allowed_when_blacklisted() {
	let (mut builder, lines) = common::builder();
	let engine = builder.whitelist(["10.0.0.1"]).start().unwrap();
	let gate = engine.gate();
	let client = ClientId::from("10.0.0.1");

	for _ in 0..6 {
		let _ = gate.intercept(&client, "http://scan/", || async { StatusCode::OK }).await;
	}
	assert!(engine.membership().inspect(&client).await.unwrap().blacklisted);
	assert_eq!(
		engine.membership().strike(&client).await.unwrap(),
		StrikeOutcome::Blacklisted { total: 1 }
	);
	// Three strike notices, then a ban notice for each later strike
	let lines = lines.lock().clone();
	assert_eq!(lines.len(), 7);
	assert!(lines[..3].iter().all(|l| l.contains("received a strike")));
	assert!(lines[3..].iter().all(|l| l.contains("was blacklisted")));

	let res = gate.intercept(&client, "/", || async { StatusCode::OK }).await;
	assert_eq!(res, Ok(StatusCode::OK));
}

#[tokio::test]
async fn test_client_on_both_lists_keeps_counting() {
	let (mut builder, lines) = common::builder();
	let engine = builder.whitelist(["W"]).blacklist(["W"]).start().unwrap();
	let client = ClientId::from("W");

	let mut outcomes = Vec::new();
	for _ in 0..5 {
		outcomes.push(engine.membership().strike(&client).await.unwrap());
	}
	assert_eq!(
		outcomes,
		vec![
			StrikeOutcome::Counted(1),
			StrikeOutcome::Counted(2),
			StrikeOutcome::Counted(3),
			StrikeOutcome::Blacklisted { total: 1 },
			StrikeOutcome::Blacklisted { total: 1 },
		]
	);
	assert_eq!(engine.membership().inspect(&client).await.unwrap().strikes, 3);
	assert_eq!(lines.lock().len(), 2);
	assert!(engine.membership().check(&client).await.unwrap());
}

#[tokio::test]
async fn test_seeded_blacklist_rejected() {
	let (mut builder, _lines) = common::builder();
	let engine = builder.blacklist(["192.0.2.66"]).start().unwrap();

	let res = engine
		.gate()
		.intercept(&"192.0.2.66".into(), "/", || async { StatusCode::OK })
		.await;
	let rejection = res.unwrap_err();
	assert_eq!(
		rejection.message,
		"IP address 192.0.2.66 was blacklisted: too many previous response code errors"
	);
}

#[tokio::test]
async fn test_handler_failure_counts_as_server_error() {
	let (engine, lines) = common::engine();
	let gate = engine.gate();
	let client = ClientId::from("10.1.1.1");

	let res = gate
		.intercept(&client, "/api", || async {
			Err::<StatusCode, _>(std::io::Error::other("database gone"))
		})
		.await;
	// The handler's own error is passed through
	assert!(matches!(res, Ok(Err(_))));

	let snapshot = engine.stats().snapshot().await.unwrap();
	assert_eq!(snapshot.internal_error, 1);
	assert_eq!(engine.membership().inspect(&client).await.unwrap().strikes, 1);
	assert_eq!(
		*lines.lock(),
		vec![
			"StatusInternalServerError count is 1",
			"IP address 10.1.1.1 received a strike: StatusInternalServerError for URI \"/api\"",
		]
	);
}

#[tokio::test]
async fn test_uninteresting_codes_are_ignored() {
	let (engine, lines) = common::engine();
	let gate = engine.gate();
	let client = ClientId::from("10.2.2.2");

	assert_eq!(
		gate.intercept(&client, "/reset/session", || async { StatusCode::FOUND }).await,
		Ok(StatusCode::FOUND)
	);
	assert_eq!(
		gate.intercept(&client, "/ws", || async { StatusCode::SWITCHING_PROTOCOLS }).await,
		Ok(StatusCode::SWITCHING_PROTOCOLS)
	);
	assert_eq!(engine.stats().snapshot().await.unwrap(), warden_core::StatsSnapshot::default());
	assert!(lines.lock().is_empty());
}

#[tokio::test]
async fn test_reject_delay() {
	let (mut builder, _lines) = common::builder();
	let engine = builder.blacklist(["10.9.9.9"]).reject_delay(Duration::from_millis(60)).start().unwrap();

	let started = tokio::time::Instant::now();
	let res = engine.gate().intercept(&"10.9.9.9".into(), "/", || async { StatusCode::OK }).await;
	assert!(res.is_err());
	assert!(started.elapsed() >= Duration::from_millis(60));

	// Admitted requests are not delayed
	let started = tokio::time::Instant::now();
	let res = engine.gate().intercept(&"10.9.9.8".into(), "/", || async { StatusCode::OK }).await;
	assert!(res.is_ok());
	assert!(started.elapsed() < Duration::from_millis(60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_counted_once() {
	let (mut builder, _lines) = common::builder();
	let engine = builder
		.thresholds(NotifyThresholds::default())
		.mailbox_capacity(4)
		.start()
		.unwrap();
	let gate = engine.gate();
	let handled = Arc::new(AtomicUsize::new(0));

	let mut tasks = Vec::new();
	for i in 0..200 {
		let gate = gate.clone();
		let handled = handled.clone();
		tasks.push(tokio::spawn(async move {
			let client = ClientId::from(format!("10.0.{}.1", i % 10));
			let code = if i % 2 == 0 { StatusCode::OK } else { StatusCode::NOT_FOUND };
			gate.intercept(&client, "/page", || async move {
				handled.fetch_add(1, Ordering::SeqCst);
				code
			})
			.await
		}));
	}
	let mut rejected = 0;
	for task in tasks {
		if task.await.unwrap().is_err() {
			rejected += 1;
		}
	}

	let snapshot = engine.stats().snapshot().await.unwrap();
	let handled = handled.load(Ordering::SeqCst) as u64;
	assert_eq!(snapshot.ok + snapshot.not_found, handled);
	assert_eq!(snapshot.forbidden, rejected);
	assert_eq!(handled + rejected, 200);
}

#[tokio::test]
async fn test_stopped_engine_fails_closed() {
	let (engine, _lines) = common::engine();
	let gate = engine.gate();
	engine.stop().await;

	let res = gate.intercept(&"10.3.3.3".into(), "/", || async { StatusCode::OK }).await;
	assert!(res.is_err());
}

// vim: ts=4
