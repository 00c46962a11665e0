//! Transaction Synchronization Module
//!
//! This module drives a resumable, idempotent sync of one account's transaction feed into local
//! storage. It is composed of several submodules, each responsible for one aspect of a run:
//!
//! - `orchestrator`: The `SyncEngine` and its run state machine. Entry point for callers.
//! - `backoff`: Retry ceiling and provider-seeded exponential delay for rate limiting.
//! - `tokens`: The in-memory token pair for a run and its refresh-and-persist path.
//! - `progress_tracker`: Accumulates run statistics and logs progress.
//! - `types`: Run-level error and statistics types.
//!
//! A run resumes from the account's checkpoint, fetches pages strictly in cursor order, and
//! commits each page together with the checkpoint advance, so an interrupted run is picked up
//! by the next one at the last fully committed page.

/// Rate-limit retry policy
pub mod backoff;
/// Main coordinator for a sync run
pub mod orchestrator;
/// Run statistics accumulation
pub mod progress_tracker;
/// Access/refresh token lifecycle during a run
pub mod tokens;
/// Error and statistics types
pub mod types;

pub use orchestrator::*;
pub use types::*;
