//! Closed-form sizing of the exponential backoff.

/// Solve for the base multiplier `m` that spreads `max_calls_total` calls over
/// `window_seconds`.
///
/// With `n = max_calls_total` there are `n - 1` waits, one between each pair of
/// consecutive calls, and wait `k` is capped at `m * 2^k`. Requiring the caps
/// to fill the window exactly gives
///
/// ```text
/// m * (2^0 + 2^1 + ... + 2^(n-2)) = m * (2^(n-1) - 1) = window
/// ```
///
/// The divisor is clamped to at least 1, so `n <= 2` yields `m = window`.
/// A `max_calls_total` too large to represent makes the divisor infinite and
/// the multiplier `0.0`.
///
/// # Examples
///
/// ```rust
/// use rebound_core::backoff::exponential_multiplier;
///
/// assert_eq!(exponential_multiplier(5, 120.0), 8.0);
/// assert_eq!(exponential_multiplier(4, 120.0), 120.0 / 7.0);
/// assert_eq!(exponential_multiplier(2, 120.0), 120.0);
/// assert_eq!(exponential_multiplier(1, 120.0), 120.0);
/// ```
pub fn exponential_multiplier(max_calls_total: u32, window_seconds: f64) -> f64 {
    let exponent = i32::try_from(max_calls_total).unwrap_or(i32::MAX) - 1;
    let count = 2f64.powi(exponent) - 1.0;
    window_seconds / count.max(1.0)
}

/// Upper bound of the wait that follows failure number `attempt` (0-based)
/// when `max_calls_total` calls share `window_seconds`.
///
/// Equal to `exponential_multiplier(max_calls_total, window_seconds) * 2^attempt`,
/// but evaluated as
///
/// ```text
/// window * 2^(attempt - (n - 1)) / (1 - 2^-(n - 1))
/// ```
///
/// so that budgets too large for `2^(n-1)` still get their schedule: the last
/// caps stay near `window / 2`, `window / 4` and so on. The result is finite,
/// never NaN, and saturates at `f64::MAX`.
///
/// # Examples
///
/// ```rust
/// use rebound_core::backoff::exponential_cap;
///
/// assert_eq!(exponential_cap(120.0, 5, 0), 8.0);
/// assert_eq!(exponential_cap(120.0, 5, 3), 64.0);
/// assert!((exponential_cap(60.0, 300_000, 299_998) - 30.0).abs() < 1e-9);
/// ```
pub fn exponential_cap(window_seconds: f64, max_calls_total: u32, attempt: u32) -> f64 {
    let waits = max_calls_total.saturating_sub(1);
    let cap = if waits <= 1 {
        window_seconds * 2f64.powi(clamp_exponent(i64::from(attempt)))
    } else {
        let shift = clamp_exponent(i64::from(attempt) - i64::from(waits));
        let normaliser = 1.0 - 2f64.powi(-clamp_exponent(i64::from(waits)));
        window_seconds * 2f64.powi(shift) / normaliser
    };
    if cap.is_nan() { 0.0 } else { cap.min(f64::MAX) }
}

fn clamp_exponent(exponent: i64) -> i32 {
    i32::try_from(exponent).unwrap_or(if exponent < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(5, 120.0, 8.0)]
    #[case(4, 120.0, 120.0 / 7.0)]
    #[case(3, 60.0, 20.0)]
    #[case(2, 120.0, 120.0)]
    #[case(1, 120.0, 120.0)]
    #[case(0, 120.0, 120.0)]
    #[case(5, 0.0, 0.0)]
    fn test_exponential_multiplier(
        #[case] max_calls_total: u32,
        #[case] window: f64,
        #[case] expected: f64,
    ) {
        assert_eq!(exponential_multiplier(max_calls_total, window), expected);
    }

    #[test]
    fn test_huge_budget_keeps_its_schedule() {
        // The multiplier itself underflows,
        assert_eq!(exponential_multiplier(5_000, 120.0), 0.0);
        assert_eq!(exponential_multiplier(u32::MAX, 120.0), 0.0);

        // but the caps are still the doubling series that fills the window.
        let total: f64 = (0..4_999).map(|k| exponential_cap(120.0, 5_000, k)).sum();
        assert!((total - 120.0).abs() < 1e-9, "caps add up to {total}");
        assert!((exponential_cap(120.0, 5_000, 4_998) - 60.0).abs() < 1e-9);
        assert!((exponential_cap(120.0, 5_000, 4_997) - 30.0).abs() < 1e-9);
        assert!((exponential_cap(120.0, u32::MAX, u32::MAX - 2) - 60.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(5, 120.0)]
    #[case(4, 120.0)]
    #[case(3, 60.0)]
    #[case(12, 3.5)]
    fn test_caps_fill_the_window(#[case] max_calls_total: u32, #[case] window: f64) {
        let total: f64 = (0..max_calls_total - 1)
            .map(|k| exponential_cap(window, max_calls_total, k))
            .sum();
        assert!((total - window).abs() < 1e-12, "caps add up to {total}");
    }

    #[test]
    fn test_cap_matches_the_multiplier() {
        for (n, k) in [(5, 0), (5, 3), (4, 1), (30, 17)] {
            let expected = exponential_multiplier(n, 120.0) * 2f64.powi(k as i32);
            let cap = exponential_cap(120.0, n, k);
            assert!((cap - expected).abs() <= expected * 1e-15, "n={n} k={k}");
        }
    }

    #[test]
    fn test_cap_doubles() {
        assert_eq!(exponential_cap(120.0, 5, 0), 8.0);
        assert_eq!(exponential_cap(120.0, 5, 1), 16.0);
        assert_eq!(exponential_cap(120.0, 5, 3), 64.0);
        // Two calls or fewer: the multiplier is the window itself.
        assert_eq!(exponential_cap(120.0, 2, 0), 120.0);
        assert_eq!(exponential_cap(120.0, 1, 2), 480.0);
    }

    #[test]
    fn test_cap_saturates() {
        assert_eq!(exponential_cap(1.0, 2, 5_000), f64::MAX);
        assert_eq!(exponential_cap(1.0, 10, u32::MAX), f64::MAX);
        assert_eq!(exponential_cap(0.0, 2, 5_000), 0.0);
        assert_eq!(exponential_cap(0.0, 10, u32::MAX), 0.0);
    }
}
