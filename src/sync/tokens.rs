//! Token lifecycle for a sync run.
//!
//! The access/refresh pair is decrypted once when a run starts. When the provider rejects the
//! access token the session refreshes it, writes the new ciphertexts to storage right away, and
//! only then swaps them in for the retried fetch.

use crate::provider::{ProviderApi, ProviderError};
use crate::storage::{ConnectionRecord, Store};
use crate::sync::SyncError;
use crate::vault::TokenVault;

use chrono::Utc;
use ring::digest::{SHA256, digest};
use tracing::{error, info};
use zeroize::Zeroizing;

/// Decrypted credentials held for the duration of one run.
pub struct TokenSession {
	account_id: String,
	access_token: Zeroizing<String>,
	refresh_token: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for TokenSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenSession")
			.field("account_id", &self.account_id)
			.field("access_token", &token_fingerprint(&self.access_token))
			.field("has_refresh_token", &self.refresh_token.is_some())
			.finish()
	}
}

impl TokenSession {
	/// Decrypt the stored token pair of a connection.
	pub fn open(connection: &ConnectionRecord, vault: &TokenVault) -> Result<Self, SyncError> {
		let access_token = Zeroizing::new(vault.decrypt(&connection.access_token_enc)?);
		let refresh_token = match connection.refresh_token_enc.as_deref() {
			Some(sealed) => Some(Zeroizing::new(vault.decrypt(sealed)?)),
			None => None,
		}
		.filter(|token| !token.is_empty());

		Ok(Self {
			account_id: connection.account_id.clone(),
			access_token,
			refresh_token,
		})
	}

	pub fn access_token(&self) -> &str {
		&self.access_token
	}

	/// Exchange the refresh token for a new access token and persist the result.
	///
	/// A rotated refresh token replaces the current one; otherwise the current one is kept.
	/// Any failure is returned as `SyncError::TokenRefreshFailed` and the session is unchanged.
	pub async fn refresh(
		&mut self,
		provider: &dyn ProviderApi,
		store: &Store,
		vault: &TokenVault,
	) -> Result<(), SyncError> {
		let presented = self
			.refresh_token
			.clone()
			.ok_or(SyncError::TokenRefreshFailed(ProviderError::TokenExpired))?;

		let grant = provider.refresh_token(&presented).await.map_err(|e| {
			error!("Failed to refresh token for account {}: {}", self.account_id, e);
			SyncError::TokenRefreshFailed(e)
		})?;

		let expires_at = grant.expires_at(Utc::now());
		let access_token = Zeroizing::new(grant.access_token);
		let rotated = grant
			.refresh_token
			.filter(|token| !token.is_empty())
			.map(Zeroizing::new);

		store.update_connection_tokens(
			&self.account_id,
			&vault.encrypt(&access_token)?,
			vault.encrypt_opt(rotated.as_deref().map(String::as_str))?.as_deref(),
			expires_at,
		)?;

		info!(
			"Refreshed access token for account {} ({} -> {}, refresh token rotated: {})",
			self.account_id,
			token_fingerprint(&self.access_token),
			token_fingerprint(&access_token),
			rotated.is_some()
		);

		self.access_token = access_token;
		if rotated.is_some() {
			self.refresh_token = rotated;
		}
		Ok(())
	}
}

/// Short, non-reversible identifier for a token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
	hex::encode(&digest(&SHA256, token.as_bytes()).as_ref()[..4])
}
