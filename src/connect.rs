//! Completion of the OAuth connection handshake.
//!
//! Once the account holder has authorized access, the provider hands back an authorization
//! code. `ConnectionService::complete` trades it for a token grant and stores the encrypted
//! credentials as the account's single connection.

use crate::provider::{ProviderApi, ProviderError};
use crate::storage::{NewConnection, StorageError, Store};
use crate::vault::{TokenVault, VaultError};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum ConnectError {
	#[error("Code exchange failed: {0}")]
	ExchangeFailed(#[source] ProviderError),
	#[error(transparent)]
	StorageError(#[from] StorageError),
	#[error(transparent)]
	VaultError(#[from] VaultError),
}

/// Result of a completed connection, free of secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
	pub account_id: String,
	pub provider: String,
	pub has_refresh_token: bool,
	pub expires_at: Option<DateTime<Utc>>,
}

pub struct ConnectionService {
	provider: Arc<dyn ProviderApi>,
	store: Arc<Store>,
	vault: TokenVault,
	/// Name recorded on stored connections.
	provider_name: String,
}

impl ConnectionService {
	pub fn new(
		provider: Arc<dyn ProviderApi>,
		store: Arc<Store>,
		vault: TokenVault,
		provider_name: &str,
	) -> Self {
		Self {
			provider,
			store,
			vault,
			provider_name: provider_name.to_string(),
		}
	}

	/// Exchange `code` for tokens and store them for `account_id`.
	///
	/// Reconnecting an account replaces its tokens; its checkpoint and transactions are kept.
	pub async fn complete(
		&self,
		account_id: &str,
		code: &str,
	) -> Result<ConnectionSummary, ConnectError> {
		let grant = self.provider.exchange_code(code).await.map_err(|e| {
			error!("Code exchange for account {} failed: {}", account_id, e);
			ConnectError::ExchangeFailed(e)
		})?;

		let refresh_token = grant.refresh_token.as_deref().filter(|t| !t.is_empty());
		let access_token_enc = self.vault.encrypt(&grant.access_token)?;
		let refresh_token_enc = self.vault.encrypt_opt(refresh_token)?;
		let expires_at = grant.expires_at(Utc::now());

		self.store.upsert_connection(&NewConnection {
			account_id,
			provider: &self.provider_name,
			access_token_enc: &access_token_enc,
			refresh_token_enc: refresh_token_enc.as_deref(),
			expires_at,
		})?;

		info!(
			"Connected account {} to provider {} (refresh token: {})",
			account_id,
			self.provider_name,
			refresh_token.is_some()
		);

		Ok(ConnectionSummary {
			account_id: account_id.to_string(),
			provider: self.provider_name.clone(),
			has_refresh_token: refresh_token.is_some(),
			expires_at,
		})
	}
}
