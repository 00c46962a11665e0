//! Storage error types.

use thiserror::Error;

/// Storage error types.
#[derive(Error, Debug)]
pub enum StorageError {
	#[error("Database error: {0}")]
	Database(#[from] rusqlite::Error),

	#[error("Migration error: {0}")]
	Migration(String),

	#[error("Storage lock poisoned")]
	LockPoisoned,

	#[error("Not found: {0}")]
	NotFound(String),
}
