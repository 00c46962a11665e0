//! Sync orchestrator and integration point for all sync services.
//!
//! This module defines the `SyncEngine`, which coordinates the provider client, the token
//! session, the rate-limit backoff, and storage to synchronize one account's transaction feed.
//!
//! A run moves through `Init -> Loading -> FetchLoop -> Draining -> Done`, or ends in
//! `Aborted` from any earlier phase. Each page fetch is its own small state machine:
//!
//! - `Fetching`: issue the request with the current cursor and access token.
//! - `TokenExpired`: refresh once and fetch the same page again. A second consecutive expiry
//!   aborts the run.
//! - `RateLimited`: consume one retry from the run-wide budget, sleep, and fetch the same page
//!   again.
//!
//! Success hands the page to storage, which commits its records and the checkpoint advance
//! together. Any other provider failure aborts the run; pages committed before it stay.

use crate::provider::{FetchOutcome, PageRequest, ProviderApi, ProviderError, TransactionPage};
use crate::storage::Store;
use crate::sync::backoff::{DEFAULT_MAX_RATE_LIMIT_RETRIES, RateLimitBackoff};
use crate::sync::progress_tracker::SyncProgressTracker;
use crate::sync::tokens::TokenSession;
use crate::sync::{RunStatistics, SyncError};
use crate::vault::TokenVault;

use backoff::backoff::Backoff;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration for sync runs
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Rate-limit retries allowed per run before giving up.
	pub max_rate_limit_retries: u32,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
		}
	}
}

/// Phases of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
	Init,
	Loading,
	FetchLoop,
	Draining,
	Done,
	Aborted,
}

impl fmt::Display for RunPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			RunPhase::Init => "init",
			RunPhase::Loading => "loading",
			RunPhase::FetchLoop => "fetch-loop",
			RunPhase::Draining => "draining",
			RunPhase::Done => "done",
			RunPhase::Aborted => "aborted",
		};
		f.write_str(name)
	}
}

/// Non-terminal states of a single page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
	Fetching,
	TokenExpired,
	RateLimited { retry_after_secs: u64 },
}

/// Main sync engine.
///
/// One engine can serve many accounts, but callers must not run two syncs for the same account
/// at the same time: concurrent runs would race on the account's checkpoint and tokens.
pub struct SyncEngine {
	provider: Arc<dyn ProviderApi>,
	store: Arc<Store>,
	vault: TokenVault,
	config: SyncConfig,
}

impl SyncEngine {
	pub fn new(
		provider: Arc<dyn ProviderApi>,
		store: Arc<Store>,
		vault: TokenVault,
		config: SyncConfig,
	) -> Self {
		Self {
			provider,
			store,
			vault,
			config,
		}
	}

	/// Synchronize an account's feed from its checkpoint to the end.
	///
	/// `rate_limit_probe` asks the provider to simulate rate limiting.
	pub async fn run_sync(
		&self,
		account_id: &str,
		rate_limit_probe: bool,
	) -> Result<RunStatistics, SyncError> {
		info!("Starting transaction sync for account {}", account_id);

		match self.execute(account_id, rate_limit_probe).await {
			Ok(tracker) => {
				self.enter(account_id, RunPhase::Done);
				info!("{}", tracker.summary());
				Ok(tracker.stats())
			}
			Err(e) => {
				self.enter(account_id, RunPhase::Aborted);
				error!("Sync for account {} aborted: {}", account_id, e);
				Err(e)
			}
		}
	}

	fn enter(&self, account_id: &str, phase: RunPhase) {
		debug!("Sync for account {} entering phase {}", account_id, phase);
	}

	async fn execute(
		&self,
		account_id: &str,
		rate_limit_probe: bool,
	) -> Result<SyncProgressTracker, SyncError> {
		self.enter(account_id, RunPhase::Init);
		let connection = self
			.store
			.get_connection(account_id)?
			.ok_or_else(|| SyncError::AccountNotConnected(account_id.to_string()))?;
		let mut session = TokenSession::open(&connection, &self.vault)?;
		let checkpoint = self.store.get_or_create_checkpoint(account_id)?;

		self.enter(account_id, RunPhase::Loading);
		let mut cursor = checkpoint.cursor;
		if let Some(c) = &cursor {
			info!("Resuming account {} from cursor {}", account_id, c);
		}
		let mut tracker = SyncProgressTracker::new(account_id, cursor.clone());
		let mut backoff = RateLimitBackoff::new(self.config.max_rate_limit_retries);

		self.enter(account_id, RunPhase::FetchLoop);
		loop {
			let page = self
				.fetch_page(
					account_id,
					cursor.as_deref(),
					rate_limit_probe,
					&mut session,
					&mut backoff,
					&mut tracker,
				)
				.await?;

			let commit = self.store.commit_page(
				account_id,
				&page.items,
				page.next_cursor.as_deref(),
				Utc::now(),
			)?;
			tracker.record_page(page.items.len(), commit);
			tracker.log_progress(page.next_cursor.as_deref());

			match page.next_cursor {
				Some(next) => cursor = Some(next),
				None => break,
			}
		}

		self.enter(account_id, RunPhase::Draining);
		Ok(tracker)
	}

	/// Fetch the page at `cursor`, recovering from expired tokens and rate limiting.
	async fn fetch_page(
		&self,
		account_id: &str,
		cursor: Option<&str>,
		rate_limit_probe: bool,
		session: &mut TokenSession,
		backoff: &mut RateLimitBackoff,
		tracker: &mut SyncProgressTracker,
	) -> Result<TransactionPage, SyncError> {
		let mut state = FetchState::Fetching;
		// Set by a refresh, cleared by any other outcome.
		let mut just_refreshed = false;

		loop {
			state = match state {
				FetchState::Fetching => {
					let request = PageRequest {
						account_id,
						access_token: session.access_token(),
						cursor,
						rate_limit_probe,
					};
					match self.provider.fetch_page(&request).await {
						FetchOutcome::Success(page) => return Ok(page),
						FetchOutcome::TokenExpired => FetchState::TokenExpired,
						FetchOutcome::RateLimited { retry_after_secs } => {
							FetchState::RateLimited { retry_after_secs }
						}
						FetchOutcome::Fatal(e) => return Err(SyncError::ProviderError(e)),
					}
				}
				FetchState::TokenExpired => {
					if just_refreshed {
						warn!(
							"Refreshed access token for account {} was rejected as well",
							account_id
						);
						return Err(SyncError::TokenRefreshFailed(ProviderError::TokenExpired));
					}
					warn!("Access token expired for account {}, refreshing", account_id);
					session
						.refresh(self.provider.as_ref(), &self.store, &self.vault)
						.await?;
					just_refreshed = true;
					FetchState::Fetching
				}
				FetchState::RateLimited { retry_after_secs } => {
					just_refreshed = false;
					backoff.observe_hint(retry_after_secs);
					let delay = backoff.next_backoff().ok_or(SyncError::MaxRetriesExceeded {
						retries: backoff.max_retries(),
					})?;
					tracker.record_rate_limit_retry();
					warn!(
						"Rate limited on account {} at cursor {:?}, retry {}/{} in {:?}",
						account_id,
						cursor,
						backoff.attempts(),
						backoff.max_retries(),
						delay
					);
					tokio::time::sleep(delay).await;
					FetchState::Fetching
				}
			};
		}
	}
}
