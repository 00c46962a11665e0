//!
//! HTTP client for the financial data provider.
//!
//! This module provides an async client for the provider's OAuth token endpoint and its
//! cursor-paginated transaction feed. Responses are mapped onto typed outcomes: 401 on the feed
//! becomes `FetchOutcome::TokenExpired`, 429 becomes `FetchOutcome::RateLimited` with the
//! provider's `Retry-After` hint, anything else that is not a success is fatal.

use super::types::*;
use super::ProviderApi;
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use std::time::Duration;
use tracing::{debug, warn};

/// Provider HTTP client
#[derive(Clone)]
pub struct ProviderClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the provider API, without a trailing slash.
	base_url: String,
	/// OAuth client identifier.
	client_id: String,
	/// OAuth client secret.
	client_secret: String,
}

impl ProviderClient {
	/// Create a new provider client.
	///
	/// # Arguments
	/// * `base_url` - Base URL of the provider API.
	/// * `client_id` - OAuth client identifier.
	/// * `client_secret` - OAuth client secret.
	/// * `timeout` - Per-request timeout.
	///
	/// # Errors
	/// Returns `ProviderError::HttpError` if the HTTP client cannot be constructed.
	pub fn new(
		base_url: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, ProviderError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
		})
	}

	/// Post a token request with the given grant fields plus client credentials.
	async fn post_token(
		&self,
		grant: &[(&str, &str)],
	) -> Result<reqwest::Response, ProviderError> {
		let mut form: Vec<(&str, &str)> = grant.to_vec();
		form.push(("client_id", self.client_id.as_str()));
		form.push(("client_secret", self.client_secret.as_str()));

		let response = self
			.http_client
			.post(format!("{}/token", self.base_url))
			.form(&form)
			.send()
			.await?;

		Ok(response)
	}

	async fn status_error(response: reqwest::Response) -> ProviderError {
		let status = response.status().as_u16();
		let body = response.text().await.unwrap_or_default();
		ProviderError::Status { status, body }
	}

	async fn try_fetch_page(&self, request: &PageRequest<'_>) -> Result<FetchOutcome, ProviderError> {
		let mut query: Vec<(&str, &str)> = vec![("account_id", request.account_id)];
		if let Some(cursor) = request.cursor {
			query.push(("cursor", cursor));
		}
		if request.rate_limit_probe {
			query.push(("rl", "true"));
		}

		debug!(
			"Fetching transactions for account {} at cursor {:?}",
			request.account_id, request.cursor
		);

		let response = self
			.http_client
			.get(format!("{}/transactions", self.base_url))
			.query(&query)
			.bearer_auth(request.access_token)
			.send()
			.await?;

		match response.status() {
			StatusCode::UNAUTHORIZED => Ok(FetchOutcome::TokenExpired),
			StatusCode::TOO_MANY_REQUESTS => {
				let retry_after_secs = parse_retry_after(
					response
						.headers()
						.get(RETRY_AFTER)
						.and_then(|value| value.to_str().ok()),
				);
				warn!(
					"Provider rate limited account {} (retry after {}s)",
					request.account_id, retry_after_secs
				);
				Ok(FetchOutcome::RateLimited { retry_after_secs })
			}
			status if status.is_success() => {
				let body: serde_json::Value = response.json().await?;
				Ok(FetchOutcome::Success(TransactionPage::from_json(body)?))
			}
			_ => Err(Self::status_error(response).await),
		}
	}
}

#[async_trait::async_trait]
impl ProviderApi for ProviderClient {
	async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
		let response = self
			.post_token(&[("grant_type", "authorization_code"), ("code", code)])
			.await?;

		if !response.status().is_success() {
			return Err(Self::status_error(response).await);
		}

		Ok(response.json().await?)
	}

	async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
		let response = self
			.post_token(&[
				("grant_type", "refresh_token"),
				("refresh_token", refresh_token),
			])
			.await?;

		match response.status() {
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::TokenExpired),
			status if status.is_success() => Ok(response.json().await?),
			_ => Err(Self::status_error(response).await),
		}
	}

	async fn fetch_page(&self, request: &PageRequest<'_>) -> FetchOutcome {
		self.try_fetch_page(request)
			.await
			.unwrap_or_else(FetchOutcome::Fatal)
	}
}
