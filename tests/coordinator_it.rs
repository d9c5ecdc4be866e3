mod common;

// std
use std::sync::Arc;
// crates.io
use futures::{FutureExt, future};
use time::Duration;
// self
use common::{RefreshReply, ScriptedTransport, descriptor, harness};
use console_session::{
	error::{Error, RefreshError},
	http::StatusCode,
	session::{RecordingNavigator, ServiceClient, Session},
	store::MemoryStore,
};

async fn wait_for_queue(client: &ServiceClient<ScriptedTransport>, depth: usize) {
	while client.coordinator().queued() < depth {
		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_replayed() {
	let h = harness("A2");

	h.transport.reply(RefreshReply::Issue { access: "A2", refresh: None });

	let request = h.client.get("orders/").expect("Path should resolve.");
	let response = h.client.send(request).await.expect("Request should recover after refresh.");

	assert_eq!(response.status, StatusCode::OK);

	let log = h.transport.log();

	assert_eq!(log.len(), 3);
	assert_eq!(log[0].authorization.as_deref(), Some("Bearer A1"));
	assert_eq!(log[1].path, common::REFRESH_PATH);
	assert_eq!(log[1].authorization, None);
	assert_eq!(log[1].body.as_deref(), Some(r#"{"refresh_token":"R1"}"#));
	assert_eq!(log[2].path, "/api/orders/");
	assert_eq!(log[2].authorization.as_deref(), Some("Bearer A2"));

	let record = h.store.snapshot().expect("Session should survive a refresh.");

	assert_eq!(record.access_token.expose(), "A2");
	assert_eq!(record.refresh_token.expose(), "R1");
	assert_eq!(record.role, "admin");
	assert_eq!(record.company_id.as_ref(), "C1");
	assert!(record.refreshed_at.is_some());
	assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn valid_token_never_touches_the_coordinator() {
	let h = harness("A1");
	let request = h.client.get("orders/").expect("Path should resolve.");

	h.client.send(request).await.expect("Request with a valid token should succeed.");

	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(h.client.coordinator().metrics().attempts(), 0);
}

#[tokio::test]
async fn concurrent_failures_share_one_refresh_and_replay_in_order() {
	let h = harness("T");
	let gate = h.transport.gate_next_refresh();

	h.transport.reply(RefreshReply::Issue { access: "T", refresh: Some("R2") });

	let sends = (0..5).map(|i| {
		let request = h.client.get(&format!("orders/{i}")).expect("Path should resolve.");

		h.client.send(request)
	});
	let driver = async {
		wait_for_queue(&h.client, 4).await;

		assert!(h.client.coordinator().is_refreshing());

		gate.send(()).expect("Refresh call should still be waiting.");
	};
	let (responses, ()) = tokio::join!(future::join_all(sends), driver);

	for response in responses {
		assert_eq!(response.expect("Every request should recover.").status, StatusCode::OK);
	}

	assert_eq!(h.transport.refresh_calls(), 1);

	let replays = h.transport.resource_log().split_off(5);
	let paths: Vec<_> = replays.iter().map(|dispatch| dispatch.path.as_str()).collect();

	assert_eq!(
		paths,
		["/api/orders/0", "/api/orders/1", "/api/orders/2", "/api/orders/3", "/api/orders/4"]
	);
	assert!(replays.iter().all(|dispatch| dispatch.authorization.as_deref() == Some("Bearer T")));

	let metrics = h.client.coordinator().metrics();

	assert_eq!(metrics.attempts(), 1);
	assert_eq!(metrics.recovered(), 1);
	assert_eq!(metrics.queued(), 4);
	assert!(!h.client.coordinator().is_refreshing());
	assert_eq!(h.client.coordinator().queued(), 0);
	assert_eq!(
		h.store.snapshot().map(|record| record.refresh_token.expose().to_owned()),
		Some("R2".into())
	);
}

#[tokio::test]
async fn dead_refresh_token_rejects_everyone_and_tears_down_once() {
	let h = harness("never");
	let gate = h.transport.gate_next_refresh();

	h.transport.reply(RefreshReply::Fail {
		status: StatusCode::BAD_REQUEST,
		body: r#"{"detail":"Invalid or expired token"}"#,
		retry_after: None,
	});

	let sends = (0..3).map(|i| {
		let request = h.client.get(&format!("sales/{i}")).expect("Path should resolve.");

		h.client.send(request)
	});
	let driver = async {
		wait_for_queue(&h.client, 2).await;

		gate.send(()).expect("Refresh call should still be waiting.");
	};
	let (responses, ()) = tokio::join!(future::join_all(sends), driver);

	for response in responses {
		let err = response.expect_err("Every request should be rejected.");

		assert!(err.is_session_expired(), "{err:?}");
	}

	assert_eq!(h.transport.refresh_calls(), 1);
	assert!(h.store.snapshot().is_none());
	assert_eq!(h.navigator.visits(), vec!["/login".to_owned()]);
	assert_eq!(h.client.coordinator().metrics().expired(), 1);

	// Nothing is signed after teardown until a new sign-in happens.
	let request = h.client.get("sales/after").expect("Path should resolve.");
	let err = h.client.send(request).await.expect_err("Signed-out request should fail.");
	let last = h.transport.resource_log().pop().expect("Request should have been dispatched.");

	assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
	assert_eq!(last.path, "/api/sales/after");
	assert_eq!(last.authorization, None);
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.navigator.count(), 1);

	h.session.sign_in(common::record("never", "R9")).await.expect("Sign-in should succeed.");

	let request = h.client.get("sales/again").expect("Path should resolve.");

	h.client.send(request).await.expect("Request after a new sign-in should succeed.");
}

#[tokio::test]
async fn other_refresh_failures_reject_the_queue_but_keep_the_session() {
	let h = harness("A2");
	let gate = h.transport.gate_next_refresh();

	h.transport
		.reply(RefreshReply::Fail {
			status: StatusCode::SERVICE_UNAVAILABLE,
			body: "maintenance",
			retry_after: Some("30"),
		})
		.reply(RefreshReply::Issue { access: "A2", refresh: None });

	let sends = (0..2).map(|i| {
		let request = h.client.get(&format!("expenses/{i}")).expect("Path should resolve.");

		h.client.send(request)
	});
	let driver = async {
		wait_for_queue(&h.client, 1).await;

		gate.send(()).expect("Refresh call should still be waiting.");
	};
	let (responses, ()) = tokio::join!(future::join_all(sends), driver);

	for response in responses {
		match response.expect_err("Every request should be rejected.") {
			Error::Refresh(RefreshError::Endpoint { status, retry_after, .. }) => {
				assert_eq!(status, Some(503));
				assert_eq!(retry_after, Some(Duration::seconds(30)));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	assert!(h.store.snapshot().is_some());
	assert_eq!(h.navigator.count(), 0);
	assert!(!h.client.coordinator().is_refreshing());

	// The coordinator is idle again, so the next failure starts a fresh episode.
	let request = h.client.get("expenses/retry").expect("Path should resolve.");

	h.client.send(request).await.expect("Second episode should recover.");

	assert_eq!(h.transport.refresh_calls(), 2);
	assert_eq!(h.client.coordinator().metrics().failed(), 1);
	assert_eq!(h.client.coordinator().metrics().recovered(), 1);
}

#[tokio::test]
async fn network_failures_during_refresh_keep_the_session() {
	let h = harness("A2");

	h.transport.reply(RefreshReply::Network);

	let request = h.client.get("inventory/").expect("Path should resolve.");
	let err = h.client.send(request).await.expect_err("Refresh failure should surface.");

	assert!(matches!(err, Error::Refresh(RefreshError::Network { .. })), "{err:?}");
	assert!(!err.is_session_expired());
	assert!(h.store.snapshot().is_some());
	assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn replayed_request_is_not_refreshed_twice() {
	let h = harness("A2");

	h.transport
		.fix_status("/api/reports/", StatusCode::UNAUTHORIZED)
		.reply(RefreshReply::Issue { access: "A2", refresh: None });

	let request = h.client.get("reports/").expect("Path should resolve.");
	let err = h.client.send(request).await.expect_err("Second 401 should surface.");

	assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
	assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.transport.resource_log().len(), 2);
}

#[tokio::test]
async fn request_carrying_the_retry_marker_fails_immediately() {
	let h = harness("A2");

	h.transport.reply(RefreshReply::Issue { access: "A2", refresh: None });

	let mut request = h.client.get("orders/").expect("Path should resolve.");

	request.mark_retried();

	let err = h.client.send(request).await.expect_err("Marked request should not be recovered.");

	assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(
		h.store.snapshot().map(|record| record.access_token.expose().to_owned()),
		Some("A1".into())
	);
}

#[tokio::test]
async fn non_authorization_errors_pass_through_untouched() {
	let h = harness("A1");

	h.transport.fix_status("/api/missing/", StatusCode::NOT_FOUND);

	let request = h.client.get("missing/").expect("Path should resolve.");
	let err = h.client.send(request).await.expect_err("404 should surface.");

	match err {
		Error::Status(failure) => {
			assert_eq!(failure.status(), StatusCode::NOT_FOUND);
			assert_eq!(failure.url.path(), "/api/missing/");
			assert_eq!(failure.response.text(), "{}");
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(h.transport.refresh_calls(), 0);
}

#[tokio::test]
async fn services_refresh_independently() {
	let h = harness("S2");
	let inventory_transport = ScriptedTransport::accepting("I2");
	let inventory: ServiceClient<ScriptedTransport> =
		h.session.service(descriptor("inventory"), inventory_transport.clone());

	h.transport.reply(RefreshReply::Issue { access: "S2", refresh: None });
	inventory_transport.reply(RefreshReply::Issue { access: "I2", refresh: None });

	let sales_gate = h.transport.gate_next_refresh();
	let inventory_gate = inventory_transport.gate_next_refresh();
	let sales_request = h.client.get("orders/").expect("Path should resolve.");
	let inventory_request = inventory.get("items/").expect("Path should resolve.");
	let driver = async {
		// Both services sit in their own episode at the same time.
		while !(h.client.coordinator().is_refreshing() && inventory.coordinator().is_refreshing()) {
			tokio::task::yield_now().await;
		}

		sales_gate.send(()).expect("Sales refresh should still be waiting.");
		inventory_gate.send(()).expect("Inventory refresh should still be waiting.");
	};
	let (sales, inventory_response, ()) =
		tokio::join!(h.client.send(sales_request), inventory.send(inventory_request), driver);

	sales.expect("Sales request should recover.");
	inventory_response.expect("Inventory request should recover.");

	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(inventory_transport.refresh_calls(), 1);
	assert_eq!(h.client.coordinator().metrics().attempts(), 1);
	assert_eq!(inventory.coordinator().metrics().attempts(), 1);
}

#[tokio::test]
async fn dropping_the_leader_releases_waiters() {
	let h = harness("A3");
	let _gate = h.transport.gate_next_refresh();

	h.transport
		.reply(RefreshReply::Issue { access: "A2", refresh: None })
		.reply(RefreshReply::Issue { access: "A3", refresh: None });

	let mut leader = h.client.send(h.client.get("orders/1").expect("Path should resolve."));

	assert!((&mut leader).now_or_never().is_none());

	let mut follower = h.client.send(h.client.get("orders/2").expect("Path should resolve."));

	assert!((&mut follower).now_or_never().is_none());
	assert_eq!(h.client.coordinator().queued(), 1);

	drop(leader);

	assert!(!h.client.coordinator().is_refreshing());
	assert!(matches!(follower.await, Err(Error::RefreshAbandoned)));

	let request = h.client.get("orders/3").expect("Path should resolve.");

	h.client.send(request).await.expect("A new episode should start after abandonment.");

	assert_eq!(h.transport.refresh_calls(), 2);
}

#[tokio::test]
async fn unauthorized_without_a_session_is_returned_untouched() {
	let store = MemoryStore::default();
	let navigator = RecordingNavigator::default();
	let session = Session::builder(Arc::new(store), Arc::new(navigator.clone())).build();
	let transport = ScriptedTransport::accepting("A1");
	let client: ServiceClient<ScriptedTransport> =
		session.service(descriptor("sales"), transport.clone());
	let err = client
		.send(client.get("orders/").expect("Path should resolve."))
		.await
		.expect_err("Anonymous request should be rejected.");

	match &err {
		Error::Unauthorized(failure) => {
			assert_eq!(failure.status(), StatusCode::UNAUTHORIZED);
			assert_eq!(failure.response.text(), r#"{"detail":"Token is invalid"}"#);
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(!err.is_session_expired());
	assert_eq!(transport.refresh_calls(), 0);
	assert_eq!(transport.log()[0].authorization, None);
	assert_eq!(navigator.count(), 0);
	assert_eq!(client.coordinator().metrics().attempts(), 0);
}

#[tokio::test]
async fn stale_response_after_teardown_does_not_navigate_again() {
	let h = harness("never");

	h.transport.reply(RefreshReply::Fail {
		status: StatusCode::BAD_REQUEST,
		body: r#"{"detail":"Invalid or expired token"}"#,
		retry_after: None,
	});

	let hold = h.transport.hold_next_response();
	let mut straggler = h.client.send(h.client.get("sales/late").expect("Path should resolve."));

	assert!((&mut straggler).now_or_never().is_none());

	let err = h
		.client
		.send(h.client.get("sales/first").expect("Path should resolve."))
		.await
		.expect_err("Dead refresh token must fail the request.");

	assert!(err.is_session_expired(), "{err:?}");
	assert_eq!(h.navigator.count(), 1);

	hold.send(()).expect("Held response should still be pending.");

	let err = straggler.await.expect_err("Stale response should still fail.");

	assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
	assert_eq!(h.transport.resource_log()[0].authorization.as_deref(), Some("Bearer A1"));
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.navigator.visits(), vec!["/login".to_owned()]);
	assert_eq!(h.client.coordinator().metrics().attempts(), 1);
	assert_eq!(h.client.coordinator().metrics().expired(), 1);
}
