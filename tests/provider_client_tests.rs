//! Wire-level tests for `ProviderClient` against a mockito server.

use std::time::Duration;

use bank_feed_sync::provider::{
	FetchOutcome, PageRequest, ProviderApi, ProviderClient, ProviderError,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn client(server: &Server) -> ProviderClient {
	ProviderClient::new(server.url(), "demo-client", "demo-secret", Duration::from_secs(5)).unwrap()
}

fn request<'a>(cursor: Option<&'a str>, rate_limit_probe: bool) -> PageRequest<'a> {
	PageRequest {
		account_id: "acct-1",
		access_token: "at_1",
		cursor,
		rate_limit_probe,
	}
}

fn page_body() -> serde_json::Value {
	json!({
		"items": [
			{
				"id": "txn_1",
				"amount": 1250,
				"currency": "EUR",
				"description": "Groceries",
				"posted_at": "2024-03-01T09:30:00Z",
				"status": "posted"
			},
			{
				"id": "txn_2",
				"amount": -300,
				"posted_at": "2024-03-02T10:00:00"
			}
		],
		"next_cursor": "p2"
	})
}

#[tokio::test]
async fn test_fetch_first_page_decodes_items() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::Exact("account_id=acct-1".to_string()))
		.match_header("authorization", "Bearer at_1")
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(page_body().to_string())
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(None, false)).await;
	mock.assert_async().await;

	let page = match outcome {
		FetchOutcome::Success(page) => page,
		other => panic!("expected a page, got {:?}", other),
	};
	assert_eq!(page.next_cursor.as_deref(), Some("p2"));
	assert_eq!(page.items.len(), 2);
	assert_eq!(page.items[0].currency, "EUR");
	assert_eq!(page.items[0].description.as_deref(), Some("Groceries"));
	assert_eq!(page.items[1].amount, -300);
	assert_eq!(page.items[1].currency, "USD");
	assert_eq!(page.items[1].status, None);
	assert!(page.items[0].raw.contains("Groceries"));
}

#[tokio::test]
async fn test_fetch_sends_cursor_and_probe() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::AllOf(vec![
			Matcher::UrlEncoded("account_id".into(), "acct-1".into()),
			Matcher::UrlEncoded("cursor".into(), "p1".into()),
			Matcher::UrlEncoded("rl".into(), "true".into()),
		]))
		.with_status(200)
		.with_body(json!({ "items": [], "next_cursor": "" }).to_string())
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(Some("p1"), true)).await;
	mock.assert_async().await;

	let page = match outcome {
		FetchOutcome::Success(page) => page,
		other => panic!("expected a page, got {:?}", other),
	};
	assert!(page.items.is_empty());
	assert!(page.is_last());
}

#[tokio::test]
async fn test_fetch_rate_limited_reads_retry_after() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::Any)
		.with_status(429)
		.with_header("retry-after", "3")
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(None, false)).await;
	assert!(matches!(outcome, FetchOutcome::RateLimited { retry_after_secs: 3 }));
}

#[tokio::test]
async fn test_fetch_rate_limited_defaults_to_one_second() {
	let mut server = Server::new_async().await;
	let _missing = server
		.mock("GET", "/transactions")
		.match_query(Matcher::UrlEncoded("cursor".into(), "p1".into()))
		.with_status(429)
		.create_async()
		.await;
	let _garbage = server
		.mock("GET", "/transactions")
		.match_query(Matcher::UrlEncoded("cursor".into(), "p2".into()))
		.with_status(429)
		.with_header("retry-after", "soon")
		.create_async()
		.await;

	let provider = client(&server);
	for cursor in ["p1", "p2"] {
		let outcome = provider.fetch_page(&request(Some(cursor), false)).await;
		assert!(
			matches!(outcome, FetchOutcome::RateLimited { retry_after_secs: 1 }),
			"cursor {}: {:?}",
			cursor,
			outcome
		);
	}
}

#[tokio::test]
async fn test_fetch_unauthorized_is_token_expired() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::Any)
		.with_status(401)
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(None, false)).await;
	assert!(matches!(outcome, FetchOutcome::TokenExpired));
}

#[tokio::test]
async fn test_fetch_server_error_is_fatal() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::Any)
		.with_status(500)
		.with_body("boom")
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(None, false)).await;
	match outcome {
		FetchOutcome::Fatal(ProviderError::Status { status, body }) => {
			assert_eq!(status, 500);
			assert_eq!(body, "boom");
		}
		other => panic!("expected fatal status error, got {:?}", other),
	}
}

#[tokio::test]
async fn test_fetch_undecodable_item_is_fatal() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("GET", "/transactions")
		.match_query(Matcher::Any)
		.with_status(200)
		.with_body(
			json!({ "items": [{ "id": "t", "amount": 1, "posted_at": "yesterday" }] }).to_string(),
		)
		.create_async()
		.await;

	let outcome = client(&server).fetch_page(&request(None, false)).await;
	assert!(matches!(
		outcome,
		FetchOutcome::Fatal(ProviderError::InvalidItem(_))
	));
}

#[tokio::test]
async fn test_exchange_code_posts_form() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/token")
		.match_body(Matcher::AllOf(vec![
			Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
			Matcher::UrlEncoded("code".into(), "auth-code".into()),
			Matcher::UrlEncoded("client_id".into(), "demo-client".into()),
			Matcher::UrlEncoded("client_secret".into(), "demo-secret".into()),
		]))
		.with_status(200)
		.with_body(
			json!({
				"access_token": "at_new",
				"refresh_token": "rt_new",
				"token_type": "bearer",
				"expires_in": 120
			})
			.to_string(),
		)
		.create_async()
		.await;

	let grant = client(&server).exchange_code("auth-code").await.unwrap();
	mock.assert_async().await;

	assert_eq!(grant.access_token, "at_new");
	assert_eq!(grant.refresh_token.as_deref(), Some("rt_new"));
	assert_eq!(grant.expires_in, Some(120));
}

#[tokio::test]
async fn test_exchange_code_rejected_is_status_error() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("POST", "/token")
		.with_status(400)
		.with_body("invalid_grant")
		.create_async()
		.await;

	let result = client(&server).exchange_code("bad").await;
	assert!(matches!(result, Err(ProviderError::Status { status: 400, .. })));
}

#[tokio::test]
async fn test_refresh_token_without_rotation() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/token")
		.match_body(Matcher::AllOf(vec![
			Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
			Matcher::UrlEncoded("refresh_token".into(), "rt_old".into()),
		]))
		.with_status(200)
		.with_body(json!({ "access_token": "at_fresh" }).to_string())
		.create_async()
		.await;

	let grant = client(&server).refresh_token("rt_old").await.unwrap();
	mock.assert_async().await;

	assert_eq!(grant.access_token, "at_fresh");
	assert_eq!(grant.refresh_token, None);
}

#[tokio::test]
async fn test_refresh_rejected_is_token_expired() {
	for status in [401, 403] {
		let mut server = Server::new_async().await;
		let _mock = server
			.mock("POST", "/token")
			.with_status(status)
			.create_async()
			.await;

		let result = client(&server).refresh_token("rt_old").await;
		assert!(
			matches!(result, Err(ProviderError::TokenExpired)),
			"status {}: {:?}",
			status,
			result
		);
	}
}

#[tokio::test]
async fn test_refresh_server_error_is_status_error() {
	let mut server = Server::new_async().await;
	let _mock = server
		.mock("POST", "/token")
		.with_status(503)
		.create_async()
		.await;

	let result = client(&server).refresh_token("rt_old").await;
	assert!(matches!(result, Err(ProviderError::Status { status: 503, .. })));
}
