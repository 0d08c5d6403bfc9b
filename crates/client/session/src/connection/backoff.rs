//! Exponential reconnect schedule.

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
///
/// Growth is uncapped; callers bound it by the attempt limit. Saturates at
/// [`Duration::MAX`] instead of overflowing.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}
