//! Progress tracking for a sync run.
//!
//! The `SyncProgressTracker` accumulates the counters that make up `RunStatistics` as pages are
//! committed and rate-limit retries are consumed, and logs progress along the way.

use crate::storage::PageCommit;
use crate::sync::RunStatistics;
use tracing::info;

/// Accumulates statistics for one run of one account.
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
	account_id: String,
	/// Cursor the run resumed from.
	start_cursor: Option<String>,
	stats: RunStatistics,
}

impl SyncProgressTracker {
	pub fn new(account_id: &str, start_cursor: Option<String>) -> Self {
		Self {
			account_id: account_id.to_string(),
			start_cursor,
			stats: RunStatistics::default(),
		}
	}

	/// Record a fetched page and what committing it did.
	pub fn record_page(&mut self, items: usize, commit: PageCommit) {
		self.stats.pages_fetched += 1;
		self.stats.items_fetched += items;
		self.stats.inserted += commit.inserted;
		self.stats.updated += commit.updated;
	}

	pub fn record_rate_limit_retry(&mut self) {
		self.stats.rate_limit_retries += 1;
	}

	pub fn stats(&self) -> RunStatistics {
		self.stats
	}

	pub fn log_progress(&self, next_cursor: Option<&str>) {
		info!(
			"Sync progress for account {}: {} pages, {} items ({} inserted, {} updated), next cursor {:?}",
			self.account_id,
			self.stats.pages_fetched,
			self.stats.items_fetched,
			self.stats.inserted,
			self.stats.updated,
			next_cursor
		);
	}

	/// Human-readable summary of the run.
	pub fn summary(&self) -> String {
		format!(
			"Sync of {} from {}: {} pages, {} items, {} inserted, {} updated{}",
			self.account_id,
			self.start_cursor
				.as_deref()
				.map(|c| format!("cursor {}", c))
				.unwrap_or_else(|| "start of feed".to_string()),
			self.stats.pages_fetched,
			self.stats.items_fetched,
			self.stats.inserted,
			self.stats.updated,
			if self.stats.rate_limit_retries == 0 {
				String::new()
			} else {
				format!(" ({} rate-limit retries)", self.stats.rate_limit_retries)
			}
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_accumulates_across_pages() {
		let mut tracker = SyncProgressTracker::new("acct", Some("p1".to_string()));
		tracker.record_page(5, PageCommit { inserted: 5, updated: 0 });
		tracker.record_rate_limit_retry();
		tracker.record_page(3, PageCommit { inserted: 1, updated: 2 });

		assert_eq!(
			tracker.stats(),
			RunStatistics {
				pages_fetched: 2,
				items_fetched: 8,
				inserted: 6,
				updated: 2,
				rate_limit_retries: 1,
			}
		);
		assert!(tracker.summary().contains("from cursor p1"));
		assert!(tracker.summary().contains("1 rate-limit retries"));
	}
}
