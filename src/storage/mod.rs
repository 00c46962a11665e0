//! Persistent Storage Module
//!
//! SQLite storage for account connections, sync checkpoints, and transaction records.
//! Token columns only ever hold vault ciphertext; this module never sees plaintext tokens.

mod checkpoints;
mod connections;
mod error;
pub mod migration;
mod models;
mod transactions;

pub use error::StorageError;
pub use models::*;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-based storage.
///
/// The connection sits behind a mutex so a `Store` can be shared across tasks; the sync engine
/// itself only ever issues one statement sequence at a time.
pub struct Store {
	conn: Mutex<Connection>,
}

impl Store {
	/// Opens or creates a database at the given path.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
		Self::init(Connection::open(path)?)
	}

	/// Creates an in-memory store (for tests and the offline demo).
	pub fn in_memory() -> Result<Self, StorageError> {
		Self::init(Connection::open_in_memory()?)
	}

	fn init(mut conn: Connection) -> Result<Self, StorageError> {
		conn.pragma_update(None, "foreign_keys", "ON")?;
		migration::MigrationRunner::run(&mut conn, &migration::all_migrations())?;
		Ok(Self {
			conn: Mutex::new(conn),
		})
	}

	pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
		self.conn.lock().map_err(|_| StorageError::LockPoisoned)
	}

	/// Returns the current schema version.
	pub fn schema_version(&self) -> Result<u32, StorageError> {
		let conn = self.conn()?;
		migration::MigrationRunner::current_version(&conn)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_migrations_are_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("feed.db");

		let store = Store::open(&path).unwrap();
		let version = store.schema_version().unwrap();
		assert_eq!(version as usize, migration::all_migrations().len());
		drop(store);

		let reopened = Store::open(&path).unwrap();
		assert_eq!(reopened.schema_version().unwrap(), version);
	}

	#[test]
	fn test_initial_schema_has_transaction_status() {
		let store = Store::in_memory().unwrap();
		assert_eq!(store.schema_version().unwrap(), 1);

		let conn = store.conn().unwrap();
		let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('transactions')").unwrap();
		let columns = stmt
			.query_map([], |row| row.get::<_, String>(0))
			.unwrap()
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		assert!(columns.iter().any(|c| c == "status"));
	}
}
