//! Versioned schema migrations.
//!
//! Applied versions are recorded in `schema_version`; pending migrations run in order inside a
//! single transaction.

use rusqlite::{Connection, params};

use super::StorageError;

/// A single schema migration step.
pub struct Migration {
	/// Monotonically increasing version number (starting at 1).
	pub version: u32,
	pub name: &'static str,
	pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
	vec![
		Migration {
			version: 1,
			name: "initial_schema",
			sql: "
				CREATE TABLE connections (
					account_id TEXT PRIMARY KEY NOT NULL,
					provider TEXT NOT NULL,
					access_token_enc TEXT NOT NULL,
					refresh_token_enc TEXT,
					expires_at TEXT,
					created_at TEXT NOT NULL,
					updated_at TEXT NOT NULL
				);

				CREATE TABLE sync_checkpoints (
					account_id TEXT PRIMARY KEY NOT NULL,
					cursor TEXT,
					last_synced_at TEXT,
					updated_at TEXT NOT NULL
				);

				CREATE TABLE transactions (
					id INTEGER PRIMARY KEY AUTOINCREMENT,
					account_id TEXT NOT NULL,
					provider_txn_id TEXT NOT NULL,
					amount INTEGER NOT NULL,
					currency TEXT NOT NULL,
					description TEXT,
					posted_at TEXT NOT NULL,
					status TEXT,
					raw_payload TEXT NOT NULL,
					created_at TEXT NOT NULL,
					updated_at TEXT NOT NULL,
					CONSTRAINT uq_account_provider_txn UNIQUE (account_id, provider_txn_id)
				);

				CREATE INDEX idx_transactions_account_posted
					ON transactions (account_id, posted_at);
			",
		},
	]
}

pub struct MigrationRunner;

impl MigrationRunner {
	/// Runs all pending migrations in one transaction; any failure rolls back all of them.
	pub fn run(conn: &mut Connection, migrations: &[Migration]) -> Result<(), StorageError> {
		conn.execute_batch(
			"CREATE TABLE IF NOT EXISTS schema_version (
				version INTEGER PRIMARY KEY,
				name TEXT NOT NULL,
				applied_at TEXT NOT NULL
			);",
		)?;

		let current_version = Self::current_version(conn)?;
		let pending: Vec<&Migration> = migrations
			.iter()
			.filter(|m| m.version > current_version)
			.collect();

		if pending.is_empty() {
			return Ok(());
		}

		for window in pending.windows(2) {
			if window[0].version >= window[1].version {
				return Err(StorageError::Migration(format!(
					"Migrations are not in order: v{} before v{}",
					window[0].version, window[1].version
				)));
			}
		}

		let tx = conn.transaction()?;
		for migration in &pending {
			tx.execute_batch(migration.sql).map_err(|e| {
				StorageError::Migration(format!(
					"Migration v{} '{}' failed: {}",
					migration.version, migration.name, e
				))
			})?;
			tx.execute(
				"INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
				params![migration.version, migration.name, chrono::Utc::now()],
			)?;
			tracing::debug!("Applied migration v{} '{}'", migration.version, migration.name);
		}
		tx.commit()?;

		Ok(())
	}

	/// Returns the current schema version, or 0 if no migrations have been applied.
	pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
		let version: Option<u32> =
			conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
		Ok(version.unwrap_or(0))
	}
}
