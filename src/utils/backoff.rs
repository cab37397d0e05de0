//! Exponential backoff utilities for retry operations.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use std::time::Duration;

/// Delay for the given 0-based retry attempt: 10ms, 20ms, 40ms... capped at 500ms.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = STARTING_BACKOFF_DELAY_MS.saturating_mul(factor).min(MAX_BACKOFF_DELAY_MS);
    Duration::from_millis(delay)
}

/// Performs exponential backoff with delay.
///
/// Sleeps for [`backoff_delay`] of `attempt` and returns the next attempt number.
pub async fn exponential_backoff_with_delay(attempt: u32) -> u32 {
    tokio::time::sleep(backoff_delay(attempt)).await;
    attempt.saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(10));
        assert_eq!(backoff_delay(1), Duration::from_millis(20));
        assert_eq!(backoff_delay(5), Duration::from_millis(320));
        assert_eq!(backoff_delay(6), Duration::from_millis(500));
        assert_eq!(backoff_delay(200), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_exponential_backoff_increments_attempt() {
        assert_eq!(exponential_backoff_with_delay(0).await, 1);
        assert_eq!(exponential_backoff_with_delay(2).await, 3);
    }
}
