/*
[INPUT]:  Attempt counter + profile growth/cap/jitter knobs
[OUTPUT]: Reconnect delays (exponential, capped, jittered)
[POS]:    WebSocket layer - reconnection pacing
[UPDATE]: When changing the backoff curve or the reset dampening rule
*/

use std::time::Duration;

use rand::Rng;

/// Exponent stops growing after this many attempts.
pub const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Pre-jitter delay: `min(base * growth^min(attempts, 10), max_delay)`.
pub fn backoff_delay(base: Duration, growth_factor: f64, attempts: u32, max_delay: Duration) -> Duration {
    let exponent = attempts.min(MAX_BACKOFF_EXPONENT) as i32;
    let scaled = base.as_secs_f64() * growth_factor.powi(exponent);
    if !scaled.is_finite() || scaled >= max_delay.as_secs_f64() {
        return max_delay;
    }
    Duration::from_secs_f64(scaled)
}

/// Perturb `delay` by a random factor in `[1 - ratio, 1 + ratio]`.
pub fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return delay;
    }
    let unit = rand::thread_rng().gen_range(-1.0..=1.0);
    scale_jitter(delay, ratio, unit)
}

/// Deterministic half of [`with_jitter`]; `unit` is in `[-1, 1]`.
pub fn scale_jitter(delay: Duration, ratio: f64, unit: f64) -> Duration {
    let factor = 1.0 + ratio * unit.clamp(-1.0, 1.0);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

/// Attempt counter after a manual reset: zeroed when low, halved when the
/// endpoint has already been failing for a while.
pub fn dampened_attempts(attempts: u32, max_attempts: u32) -> u32 {
    if attempts > max_attempts / 2 {
        attempts / 2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let base = Duration::from_millis(1_000);
        let cap = Duration::from_secs(30);
        let mut previous = Duration::ZERO;
        for attempts in 0..=25 {
            let delay = backoff_delay(base, 1.7, attempts, cap);
            assert!(delay >= previous, "attempt {attempts} shrank the delay");
            assert!(delay <= cap, "attempt {attempts} exceeded the cap");
            previous = delay;
        }
        assert_eq!(previous, cap);
    }

    #[rstest]
    #[case(0, 1_000)]
    #[case(1, 2_000)]
    #[case(2, 4_000)]
    #[case(4, 16_000)]
    #[case(5, 30_000)]
    #[case(40, 30_000)]
    fn backoff_doubles_until_cap(#[case] attempts: u32, #[case] expected_ms: u64) {
        let delay = backoff_delay(
            Duration::from_secs(1),
            2.0,
            attempts,
            Duration::from_secs(30),
        );
        assert_eq!(delay, Duration::from_millis(expected_ms));
    }

    #[test]
    fn exponent_is_clamped() {
        let huge = Duration::from_secs(86_400);
        let at_ten = backoff_delay(Duration::from_millis(10), 2.0, 10, huge);
        let at_twenty = backoff_delay(Duration::from_millis(10), 2.0, 20, huge);
        assert_eq!(at_ten, at_twenty);
        assert!(at_ten.abs_diff(Duration::from_millis(10_240)) < Duration::from_millis(1));
    }

    #[test]
    fn base_above_cap_returns_cap() {
        let delay = backoff_delay(Duration::from_secs(90), 1.5, 0, Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_in_band() {
        let delay = Duration::from_secs(10);
        for _ in 0..500 {
            let jittered = with_jitter(delay, 0.15);
            assert!(jittered >= Duration::from_millis(8_499));
            assert!(jittered <= Duration::from_millis(11_501));
        }
        let low = scale_jitter(delay, 0.15, -1.0);
        let high = scale_jitter(delay, 0.15, 1.0);
        assert!(low.abs_diff(Duration::from_millis(8_500)) < Duration::from_millis(1));
        assert!(high.abs_diff(Duration::from_millis(11_500)) < Duration::from_millis(1));
        assert_eq!(with_jitter(delay, 0.0), delay);
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(3, 10, 0)]
    #[case(5, 10, 0)]
    #[case(6, 10, 3)]
    #[case(10, 10, 5)]
    fn reset_dampens_high_counters(#[case] attempts: u32, #[case] max: u32, #[case] expected: u32) {
        assert_eq!(dampened_attempts(attempts, max), expected);
    }
}
