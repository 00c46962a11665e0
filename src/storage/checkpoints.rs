//! Sync checkpoint storage operations.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Store, StorageError, SyncCheckpoint};

impl Store {
	/// Gets the account's checkpoint, creating an empty one on first use.
	pub fn get_or_create_checkpoint(&self, account_id: &str) -> Result<SyncCheckpoint, StorageError> {
		let conn = self.conn()?;
		conn.execute(
			"INSERT OR IGNORE INTO sync_checkpoints (account_id, cursor, last_synced_at, updated_at)
			 VALUES (?1, NULL, NULL, ?2)",
			params![account_id, Utc::now()],
		)?;
		read_checkpoint(&conn, account_id)?
			.ok_or_else(|| StorageError::NotFound(format!("checkpoint for {}", account_id)))
	}

	/// Gets the account's checkpoint without creating one.
	pub fn get_checkpoint(&self, account_id: &str) -> Result<Option<SyncCheckpoint>, StorageError> {
		let conn = self.conn()?;
		read_checkpoint(&conn, account_id)
	}

	/// Overwrites the account's checkpoint.
	pub fn set_checkpoint(
		&self,
		account_id: &str,
		cursor: Option<&str>,
		synced_at: Option<DateTime<Utc>>,
	) -> Result<(), StorageError> {
		let conn = self.conn()?;
		write_checkpoint(&conn, account_id, cursor, synced_at)
	}
}

fn read_checkpoint(conn: &Connection, account_id: &str) -> Result<Option<SyncCheckpoint>, StorageError> {
	let checkpoint = conn
		.query_row(
			"SELECT account_id, cursor, last_synced_at FROM sync_checkpoints WHERE account_id = ?1",
			params![account_id],
			|row| {
				Ok(SyncCheckpoint {
					account_id: row.get(0)?,
					cursor: row.get(1)?,
					last_synced_at: row.get(2)?,
				})
			},
		)
		.optional()?;
	Ok(checkpoint)
}

/// Upserts the checkpoint row. Accepts a plain connection or an open transaction.
pub(super) fn write_checkpoint(
	conn: &Connection,
	account_id: &str,
	cursor: Option<&str>,
	synced_at: Option<DateTime<Utc>>,
) -> Result<(), StorageError> {
	conn.execute(
		"INSERT INTO sync_checkpoints (account_id, cursor, last_synced_at, updated_at)
		 VALUES (?1, ?2, ?3, ?4)
		 ON CONFLICT (account_id) DO UPDATE SET
			cursor = excluded.cursor,
			last_synced_at = excluded.last_synced_at,
			updated_at = excluded.updated_at",
		params![account_id, cursor, synced_at, Utc::now()],
	)?;
	Ok(())
}
