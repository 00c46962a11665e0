//! Bank feed sync.
//!
//! Synchronizes transaction feeds from an OAuth-protected financial data provider into a local
//! SQLite store. The sync engine resumes from a persisted cursor, upserts records idempotently,
//! backs off on rate limiting and refreshes expired access tokens.

pub mod config;
pub mod connect;
pub mod provider;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod vault;
