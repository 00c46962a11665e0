//! Remote provider integration.
//!
//! This module provides the typed client for the financial data provider together with the
//! wire types it speaks. The provider exposes an OAuth token endpoint and a cursor-paginated
//! transaction feed. Transport failures are translated into typed signals here; every retry
//! and backoff decision is left to the sync engine.

/// HTTP client for the provider's token and transaction endpoints
mod client;
/// In-process provider used by tests and the offline demo
pub mod mock;
/// Type definitions for provider wire data
mod types;

pub use client::ProviderClient;
pub use mock::MockProvider;
pub use types::*;

/// Operations the sync engine needs from a remote provider.
///
/// Implementations perform exactly one network exchange per call and never retry.
#[async_trait::async_trait]
pub trait ProviderApi: Send + Sync {
	/// Exchange an authorization code for a token grant.
	async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

	/// Obtain a fresh access token from a refresh token.
	///
	/// Fails with `ProviderError::TokenExpired` when the refresh token itself is rejected.
	async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

	/// Fetch one page of the transaction feed.
	async fn fetch_page(&self, request: &PageRequest<'_>) -> FetchOutcome;
}
