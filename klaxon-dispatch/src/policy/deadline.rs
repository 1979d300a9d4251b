//! Deadlines from configured durations

use std::time::Duration;

use tokio::time::Instant;

/// Roughly 30 years; what a deadline becomes when the timeout is too large
/// to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `timeout` from now.
///
/// Timeouts that overflow the clock are treated as unbounded and clamp to a
/// far-future instant.
#[must_use]
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Returns `true` if waiting `delay` from now would reach `deadline`.
#[must_use]
pub fn overruns(delay: Duration, deadline: Instant) -> bool {
    Instant::now()
        .checked_add(delay)
        .is_none_or(|end| end >= deadline)
}
