//! Exponential backoff schedule

use std::time::Duration;

use crate::types::RetryPolicy;

/// Delay to wait after the given failed attempt, 1-based.
///
/// Grows as `initial * multiplier^(attempt - 1)` and is clamped to the
/// policy ceiling. Attempt numbers below one are treated as one.
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63) as i32;
    let raw = policy.initial_delay_ms as f64 * policy.backoff_multiplier.powi(exponent);
    let capped = raw.min(policy.max_delay_ms as f64).max(0.0);
    Duration::from_millis(capped as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence_doubles_from_initial() {
        let policy = RetryPolicy::default()
            .with_initial_delay_ms(500)
            .with_backoff_multiplier(2.0)
            .with_max_delay_ms(5000);

        let delays: Vec<u64> = (1..=4)
            .map(|attempt| delay_for_attempt(&policy, attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000]);
    }

    #[test]
    fn test_delay_is_clamped_to_ceiling() {
        let policy = RetryPolicy::default()
            .with_initial_delay_ms(500)
            .with_backoff_multiplier(2.0)
            .with_max_delay_ms(5000);

        assert_eq!(delay_for_attempt(&policy, 5).as_millis(), 5000);
        assert_eq!(delay_for_attempt(&policy, 20).as_millis(), 5000);
    }

    #[test]
    fn test_attempt_zero_gets_the_initial_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(delay_for_attempt(&policy, 0), delay_for_attempt(&policy, 1));
    }

    #[test]
    fn test_fractional_multiplier_shrinks_the_delay() {
        let policy = RetryPolicy::default()
            .with_initial_delay_ms(1000)
            .with_backoff_multiplier(0.5);

        assert_eq!(delay_for_attempt(&policy, 2).as_millis(), 500);
    }
}
