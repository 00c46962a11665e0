use crate::provider::ProviderError;
use crate::storage::StorageError;
use crate::vault::VaultError;

use serde::{Deserialize, Serialize};

/// Statistics for one sync run. Returned to the caller, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
	pub pages_fetched: usize,
	pub items_fetched: usize,
	pub inserted: usize,
	pub updated: usize,
	pub rate_limit_retries: usize,
}

/// Error types for a sync run
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("No connection found for account {0}")]
	AccountNotConnected(String),

	#[error("Token refresh failed: {0}")]
	TokenRefreshFailed(#[source] ProviderError),

	#[error("Max rate limit retries exceeded ({retries})")]
	MaxRetriesExceeded { retries: u32 },

	#[error("Provider error: {0}")]
	ProviderError(#[from] ProviderError),

	#[error("Storage error: {0}")]
	StorageError(#[from] StorageError),

	#[error("Vault error: {0}")]
	VaultError(#[from] VaultError),
}
