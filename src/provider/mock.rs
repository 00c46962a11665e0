//! In-process provider for tests and the offline demo.
//!
//! `MockProvider` speaks the same contract as the real provider without a network: a feed of
//! three pages of five transactions per account, an OAuth token endpoint that accepts one
//! client credential pair, and an opt-in rate-limit probe. The rate-limit table is owned by the
//! provider instance and cleared with `reset_rate_limits`, so every test starts from a clean
//! slate. Failures can be scripted ahead of time to drive the sync engine through its recovery
//! paths.

use super::types::*;
use super::ProviderApi;
use chrono::{Duration, NaiveDate};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub const MOCK_CLIENT_ID: &str = "demo-client";
pub const MOCK_CLIENT_SECRET: &str = "demo-secret";

/// Number of non-empty pages in each account's feed.
pub const MOCK_PAGE_COUNT: usize = 3;
/// Transactions per page.
pub const MOCK_PAGE_SIZE: usize = 5;

const MOCK_TOKEN_LIFETIME_SECS: i64 = 120;

/// A fetch response forced ahead of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFetch {
	TokenExpired,
	RateLimited { retry_after_secs: u64 },
	ServerError(u16),
}

/// A refresh response forced ahead of the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRefresh {
	/// The refresh token is rejected (HTTP 401).
	Rejected,
	ServerError(u16),
	/// A successful grant that does not rotate the refresh token.
	AccessTokenOnly,
}

/// A fetch observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
	pub account_id: String,
	pub cursor: Option<String>,
	pub access_token: String,
}

#[derive(Default)]
struct MockState {
	/// Keys `account:cursor` that have already been rate limited once.
	rate_limited_keys: HashSet<String>,
	fetch_script: VecDeque<ScriptedFetch>,
	refresh_script: VecDeque<ScriptedRefresh>,
	fetch_calls: Vec<FetchCall>,
	refresh_calls: Vec<String>,
	/// Added to every generated amount, to simulate remote corrections.
	amount_adjustment: i64,
}

/// In-memory provider implementing `ProviderApi`.
pub struct MockProvider {
	client_id: String,
	client_secret: String,
	state: Mutex<MockState>,
}

impl Default for MockProvider {
	fn default() -> Self {
		Self::new()
	}
}

impl MockProvider {
	/// Create a provider that presents the accepted demo credentials.
	pub fn new() -> Self {
		Self::with_client_credentials(MOCK_CLIENT_ID, MOCK_CLIENT_SECRET)
	}

	/// Create a provider whose token calls present the given client credentials.
	pub fn with_client_credentials(client_id: &str, client_secret: &str) -> Self {
		Self {
			client_id: client_id.to_string(),
			client_secret: client_secret.to_string(),
			state: Mutex::new(MockState::default()),
		}
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Forget which keys have been rate limited.
	pub fn reset_rate_limits(&self) {
		self.state().rate_limited_keys.clear();
	}

	/// Queue a response for an upcoming fetch.
	pub fn script_fetch(&self, response: ScriptedFetch) {
		self.state().fetch_script.push_back(response);
	}

	/// Queue a response for an upcoming refresh.
	pub fn script_refresh(&self, response: ScriptedRefresh) {
		self.state().refresh_script.push_back(response);
	}

	/// Shift every generated amount by `delta` minor units.
	pub fn set_amount_adjustment(&self, delta: i64) {
		self.state().amount_adjustment = delta;
	}

	pub fn fetch_calls(&self) -> Vec<FetchCall> {
		self.state().fetch_calls.clone()
	}

	/// Refresh tokens presented to the token endpoint, in call order.
	pub fn refresh_calls(&self) -> Vec<String> {
		self.state().refresh_calls.clone()
	}

	fn check_client(&self) -> Result<(), ProviderError> {
		if self.client_id != MOCK_CLIENT_ID || self.client_secret != MOCK_CLIENT_SECRET {
			return Err(ProviderError::Status {
				status: 401,
				body: "Invalid client credentials".to_string(),
			});
		}
		Ok(())
	}

	fn issue_grant(rotate_refresh: bool) -> TokenGrant {
		TokenGrant {
			access_token: format!("at_{}", uuid::Uuid::new_v4()),
			refresh_token: rotate_refresh.then(|| format!("rt_{}", uuid::Uuid::new_v4())),
			token_type: Some("bearer".to_string()),
			expires_in: Some(MOCK_TOKEN_LIFETIME_SECS),
		}
	}

	/// Page index addressed by a cursor; unknown cursors restart the feed.
	fn page_index(cursor: Option<&str>) -> usize {
		cursor
			.and_then(|c| c.strip_prefix('p'))
			.and_then(|n| n.parse().ok())
			.unwrap_or(0)
	}

	/// Build the JSON body the provider would return for a page.
	pub fn page_body(account_id: &str, cursor: Option<&str>, amount_adjustment: i64) -> serde_json::Value {
		let page = Self::page_index(cursor);
		let base_time = NaiveDate::from_ymd_opt(2024, 1, 1)
			.and_then(|d| d.and_hms_opt(0, 0, 0))
			.unwrap_or_default();

		let items: Vec<serde_json::Value> = if page < MOCK_PAGE_COUNT {
			(0..MOCK_PAGE_SIZE)
				.map(|i| {
					let idx = page * MOCK_PAGE_SIZE + i;
					let posted_at = base_time + Duration::hours(idx as i64);
					serde_json::json!({
						"id": format!("txn_{}_{}", account_id, idx),
						"amount": 1000 + (idx as i64) * 100 + amount_adjustment,
						"currency": "USD",
						"description": format!("Mock Txn {} for {}", idx, account_id),
						"posted_at": posted_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
						"status": "posted",
					})
				})
				.collect()
		} else {
			Vec::new()
		};

		let next_cursor = (!items.is_empty() && page + 1 < MOCK_PAGE_COUNT)
			.then(|| format!("p{}", page + 1));

		serde_json::json!({
			"items": items,
			"next_cursor": next_cursor,
		})
	}
}

#[async_trait::async_trait]
impl ProviderApi for MockProvider {
	async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
		self.check_client()?;
		debug!("Mock provider exchanging code {}", code);
		Ok(Self::issue_grant(true))
	}

	async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
		let scripted = {
			let mut state = self.state();
			state.refresh_calls.push(refresh_token.to_string());
			state.refresh_script.pop_front()
		};

		match scripted {
			Some(ScriptedRefresh::Rejected) => Err(ProviderError::TokenExpired),
			Some(ScriptedRefresh::ServerError(status)) => Err(ProviderError::Status {
				status,
				body: "refresh failed".to_string(),
			}),
			Some(ScriptedRefresh::AccessTokenOnly) => {
				self.check_client()?;
				Ok(Self::issue_grant(false))
			}
			None => {
				self.check_client()?;
				Ok(Self::issue_grant(true))
			}
		}
	}

	async fn fetch_page(&self, request: &PageRequest<'_>) -> FetchOutcome {
		let mut state = self.state();
		state.fetch_calls.push(FetchCall {
			account_id: request.account_id.to_string(),
			cursor: request.cursor.map(str::to_string),
			access_token: request.access_token.to_string(),
		});

		if let Some(scripted) = state.fetch_script.pop_front() {
			return match scripted {
				ScriptedFetch::TokenExpired => FetchOutcome::TokenExpired,
				ScriptedFetch::RateLimited { retry_after_secs } => {
					FetchOutcome::RateLimited { retry_after_secs }
				}
				ScriptedFetch::ServerError(status) => FetchOutcome::Fatal(ProviderError::Status {
					status,
					body: "internal error".to_string(),
				}),
			};
		}

		if request.rate_limit_probe {
			let key = format!("{}:{}", request.account_id, request.cursor.unwrap_or("None"));
			if state.rate_limited_keys.insert(key) {
				return FetchOutcome::RateLimited {
					retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
				};
			}
		}

		let body = Self::page_body(request.account_id, request.cursor, state.amount_adjustment);
		match TransactionPage::from_json(body) {
			Ok(page) => FetchOutcome::Success(page),
			Err(e) => FetchOutcome::Fatal(e),
		}
	}
}
