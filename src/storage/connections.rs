//! Connection storage operations.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{ConnectionRecord, NewConnection, Store, StorageError};

impl Store {
	/// Inserts the account's connection, or replaces its tokens if one already exists.
	pub fn upsert_connection(&self, connection: &NewConnection<'_>) -> Result<(), StorageError> {
		let now = Utc::now();
		self.conn()?.execute(
			"INSERT INTO connections
			 (account_id, provider, access_token_enc, refresh_token_enc, expires_at, created_at, updated_at)
			 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
			 ON CONFLICT (account_id) DO UPDATE SET
				provider = excluded.provider,
				access_token_enc = excluded.access_token_enc,
				refresh_token_enc = excluded.refresh_token_enc,
				expires_at = excluded.expires_at,
				updated_at = excluded.updated_at",
			params![
				connection.account_id,
				connection.provider,
				connection.access_token_enc,
				connection.refresh_token_enc,
				connection.expires_at,
				now,
			],
		)?;
		Ok(())
	}

	/// Gets the connection for an account.
	pub fn get_connection(&self, account_id: &str) -> Result<Option<ConnectionRecord>, StorageError> {
		let record = self
			.conn()?
			.query_row(
				"SELECT account_id, provider, access_token_enc, refresh_token_enc, expires_at,
				        created_at, updated_at
				 FROM connections WHERE account_id = ?1",
				params![account_id],
				row_to_connection,
			)
			.optional()?;
		Ok(record)
	}

	/// Stores refreshed tokens. A `None` refresh token keeps the one already stored.
	///
	/// Commits immediately, independently of any page commit.
	pub fn update_connection_tokens(
		&self,
		account_id: &str,
		access_token_enc: &str,
		refresh_token_enc: Option<&str>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<(), StorageError> {
		let rows_affected = self.conn()?.execute(
			"UPDATE connections SET
				access_token_enc = ?2,
				refresh_token_enc = COALESCE(?3, refresh_token_enc),
				expires_at = ?4,
				updated_at = ?5
			 WHERE account_id = ?1",
			params![account_id, access_token_enc, refresh_token_enc, expires_at, Utc::now()],
		)?;

		if rows_affected == 0 {
			return Err(StorageError::NotFound(format!("connection for {}", account_id)));
		}
		Ok(())
	}
}

fn row_to_connection(row: &Row<'_>) -> rusqlite::Result<ConnectionRecord> {
	Ok(ConnectionRecord {
		account_id: row.get(0)?,
		provider: row.get(1)?,
		access_token_enc: row.get(2)?,
		refresh_token_enc: row.get(3)?,
		expires_at: row.get(4)?,
		created_at: row.get(5)?,
		updated_at: row.get(6)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn connection<'a>(access: &'a str, refresh: Option<&'a str>) -> NewConnection<'a> {
		NewConnection {
			account_id: "acct-1",
			provider: "mock-provider",
			access_token_enc: access,
			refresh_token_enc: refresh,
			expires_at: None,
		}
	}

	#[test]
	fn test_one_connection_per_account() {
		let store = Store::in_memory().unwrap();
		store.upsert_connection(&connection("a1", Some("r1"))).unwrap();
		store.upsert_connection(&connection("a2", Some("r2"))).unwrap();

		let stored = store.get_connection("acct-1").unwrap().unwrap();
		assert_eq!(stored.access_token_enc, "a2");
		assert_eq!(stored.refresh_token_enc.as_deref(), Some("r2"));
		assert!(store.get_connection("acct-2").unwrap().is_none());
	}

	#[test]
	fn test_update_tokens_keeps_refresh_token_when_not_rotated() {
		let store = Store::in_memory().unwrap();
		store.upsert_connection(&connection("a1", Some("r1"))).unwrap();

		store.update_connection_tokens("acct-1", "a2", None, None).unwrap();
		let stored = store.get_connection("acct-1").unwrap().unwrap();
		assert_eq!(stored.access_token_enc, "a2");
		assert_eq!(stored.refresh_token_enc.as_deref(), Some("r1"));

		assert!(matches!(
			store.update_connection_tokens("missing", "a", None, None),
			Err(StorageError::NotFound(_))
		));
	}
}
