//! Persisted records.

use chrono::{DateTime, Utc};

/// The single OAuth connection of an account. Token fields hold vault ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
	pub account_id: String,
	pub provider: String,
	pub access_token_enc: String,
	pub refresh_token_enc: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Values written when an account (re)connects.
#[derive(Debug, Clone)]
pub struct NewConnection<'a> {
	pub account_id: &'a str,
	pub provider: &'a str,
	pub access_token_enc: &'a str,
	pub refresh_token_enc: Option<&'a str>,
	pub expires_at: Option<DateTime<Utc>>,
}

/// Resumable position in an account's feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCheckpoint {
	pub account_id: String,
	/// Provider-opaque cursor; `None` means start of feed or fully drained.
	pub cursor: Option<String>,
	pub last_synced_at: Option<DateTime<Utc>>,
}

/// A stored transaction, unique per `(account_id, provider_txn_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
	pub account_id: String,
	pub provider_txn_id: String,
	/// Minor currency units.
	pub amount: i64,
	pub currency: String,
	pub description: Option<String>,
	pub posted_at: DateTime<Utc>,
	pub status: Option<String>,
	/// Original provider item, serialized.
	pub raw_payload: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
	Inserted,
	Updated,
}

/// Counts for one committed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCommit {
	pub inserted: usize,
	pub updated: usize,
}
