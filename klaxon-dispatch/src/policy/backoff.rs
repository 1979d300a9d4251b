//! Exponential backoff with jitter

use std::time::Duration;

use rand::Rng;

/// Calculate the delay before the next attempt
///
/// # Formula
/// `delay = min(base * 2^(attempt - 1), max_delay) * (1 ± jitter)`
///
/// # Arguments
/// * `attempt` - The attempt that just failed (1-indexed)
/// * `base_delay_ms` - Base delay in milliseconds (e.g., 200)
/// * `max_delay_ms` - Maximum delay in milliseconds (e.g., 5000)
/// * `jitter_factor` - Jitter factor (e.g., 0.1 for ±10%)
pub fn calculate_backoff(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        max_delay_ms
    } else {
        let multiplier = 1u64 << exponent;
        base_delay_ms.saturating_mul(multiplier).min(max_delay_ms)
    };

    if jitter_factor <= 0.0 || delay == 0 {
        return Duration::from_millis(delay);
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered = {
        let jitter_range = (delay as f64) * jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        ((delay as f64) + jitter).clamp(0.0, max_delay_ms as f64) as u64
    };

    Duration::from_millis(jittered)
}
