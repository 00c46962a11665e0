//! Transaction record storage operations.
//!
//! Records are keyed by `(account_id, provider_txn_id)`. Every sighting of a known key
//! overwrites the stored values unconditionally, so replays are harmless and remote corrections
//! always win.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::checkpoints::write_checkpoint;
use super::{PageCommit, Store, StorageError, TransactionRecord, UpsertOutcome};
use crate::provider::TransactionItem;

impl Store {
	/// Upserts every item of a page and advances the checkpoint, all in one transaction.
	///
	/// Either the whole page and its cursor are durable afterwards, or nothing is.
	pub fn commit_page(
		&self,
		account_id: &str,
		items: &[TransactionItem],
		next_cursor: Option<&str>,
		synced_at: DateTime<Utc>,
	) -> Result<PageCommit, StorageError> {
		let mut conn = self.conn()?;
		let tx = conn.transaction()?;

		let mut commit = PageCommit::default();
		for item in items {
			match upsert(&tx, account_id, item, synced_at)? {
				UpsertOutcome::Inserted => commit.inserted += 1,
				UpsertOutcome::Updated => commit.updated += 1,
			}
		}
		write_checkpoint(&tx, account_id, next_cursor, Some(synced_at))?;

		tx.commit()?;
		Ok(commit)
	}

	/// Upserts a single item outside of a page commit.
	pub fn upsert_transaction(
		&self,
		account_id: &str,
		item: &TransactionItem,
	) -> Result<UpsertOutcome, StorageError> {
		let conn = self.conn()?;
		upsert(&conn, account_id, item, Utc::now())
	}

	pub fn get_transaction(
		&self,
		account_id: &str,
		provider_txn_id: &str,
	) -> Result<Option<TransactionRecord>, StorageError> {
		let record = self
			.conn()?
			.query_row(
				&format!("{} WHERE account_id = ?1 AND provider_txn_id = ?2", SELECT_RECORD),
				params![account_id, provider_txn_id],
				row_to_record,
			)
			.optional()?;
		Ok(record)
	}

	/// Lists an account's transactions, most recently posted first.
	pub fn list_transactions(
		&self,
		account_id: &str,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		let conn = self.conn()?;
		let mut stmt = conn.prepare(&format!(
			"{} WHERE account_id = ?1 ORDER BY posted_at DESC, provider_txn_id LIMIT ?2",
			SELECT_RECORD
		))?;

		let records = stmt
			.query_map(params![account_id, limit as i64], row_to_record)?
			.collect::<Result<Vec<_>, _>>()?;
		Ok(records)
	}

	pub fn count_transactions(&self, account_id: &str) -> Result<usize, StorageError> {
		let count: i64 = self.conn()?.query_row(
			"SELECT COUNT(*) FROM transactions WHERE account_id = ?1",
			params![account_id],
			|row| row.get(0),
		)?;
		Ok(count as usize)
	}
}

const SELECT_RECORD: &str = "SELECT account_id, provider_txn_id, amount, currency, description,
	posted_at, status, raw_payload, created_at, updated_at FROM transactions";

fn upsert(
	conn: &Connection,
	account_id: &str,
	item: &TransactionItem,
	now: DateTime<Utc>,
) -> Result<UpsertOutcome, StorageError> {
	let existing: Option<i64> = conn
		.query_row(
			"SELECT id FROM transactions WHERE account_id = ?1 AND provider_txn_id = ?2",
			params![account_id, item.id],
			|row| row.get(0),
		)
		.optional()?;

	match existing {
		Some(id) => {
			conn.execute(
				"UPDATE transactions SET
					amount = ?2, currency = ?3, description = ?4, posted_at = ?5,
					status = ?6, raw_payload = ?7, updated_at = ?8
				 WHERE id = ?1",
				params![
					id,
					item.amount,
					item.currency,
					item.description,
					item.posted_at,
					item.status,
					item.raw,
					now,
				],
			)?;
			Ok(UpsertOutcome::Updated)
		}
		None => {
			conn.execute(
				"INSERT INTO transactions
				 (account_id, provider_txn_id, amount, currency, description, posted_at,
				  status, raw_payload, created_at, updated_at)
				 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
				params![
					account_id,
					item.id,
					item.amount,
					item.currency,
					item.description,
					item.posted_at,
					item.status,
					item.raw,
					now,
				],
			)?;
			Ok(UpsertOutcome::Inserted)
		}
	}
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
	Ok(TransactionRecord {
		account_id: row.get(0)?,
		provider_txn_id: row.get(1)?,
		amount: row.get(2)?,
		currency: row.get(3)?,
		description: row.get(4)?,
		posted_at: row.get(5)?,
		status: row.get(6)?,
		raw_payload: row.get(7)?,
		created_at: row.get(8)?,
		updated_at: row.get(9)?,
	})
}
