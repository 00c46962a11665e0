//! Rate-limit backoff.
//!
//! Each 429 consumes one retry from a budget that spans the whole run. The delay before the
//! n-th retry is the provider's latest `Retry-After` hint multiplied by `2^(n-1)`. Once the
//! budget is exceeded `next_backoff` yields `None` and the run gives up.

use backoff::backoff::Backoff;
use std::time::Duration;

/// Retry ceiling used when none is configured.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Provider-seeded exponential backoff with a retry ceiling.
#[derive(Debug, Clone)]
pub struct RateLimitBackoff {
	max_retries: u32,
	/// Retries consumed so far in this run.
	attempts: u32,
	/// Most recent provider hint.
	hint: Duration,
}

impl RateLimitBackoff {
	pub fn new(max_retries: u32) -> Self {
		Self {
			max_retries,
			attempts: 0,
			hint: Duration::from_secs(crate::provider::DEFAULT_RETRY_AFTER_SECS),
		}
	}

	/// Record the provider's `Retry-After` value for the next delay.
	pub fn observe_hint(&mut self, retry_after_secs: u64) {
		self.hint = Duration::from_secs(retry_after_secs);
	}

	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}
}

impl Default for RateLimitBackoff {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_RATE_LIMIT_RETRIES)
	}
}

impl Backoff for RateLimitBackoff {
	fn reset(&mut self) {
		self.attempts = 0;
	}

	fn next_backoff(&mut self) -> Option<Duration> {
		self.attempts = self.attempts.saturating_add(1);
		if self.attempts > self.max_retries {
			return None;
		}

		let factor = 1u32.checked_shl(self.attempts - 1).unwrap_or(u32::MAX);
		Some(self.hint.saturating_mul(factor))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delay_doubles_from_hint() {
		let mut backoff = RateLimitBackoff::new(5);
		backoff.observe_hint(1);

		let delays: Vec<u64> = (0..5)
			.map(|_| backoff.next_backoff().unwrap().as_secs())
			.collect();
		assert_eq!(delays, vec![1, 2, 4, 8, 16]);
	}

	#[test]
	fn test_latest_hint_seeds_delay() {
		let mut backoff = RateLimitBackoff::new(5);
		backoff.observe_hint(3);
		assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));

		backoff.observe_hint(2);
		assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(4)));
	}

	#[test]
	fn test_ceiling_exceeded() {
		let mut backoff = RateLimitBackoff::new(2);
		assert!(backoff.next_backoff().is_some());
		assert!(backoff.next_backoff().is_some());
		assert_eq!(backoff.next_backoff(), None);
		assert_eq!(backoff.attempts(), 3);

		let mut none_allowed = RateLimitBackoff::new(0);
		assert_eq!(none_allowed.next_backoff(), None);
	}
}
