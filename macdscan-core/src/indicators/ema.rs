//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * value[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Seed: EMA at the first finite input equals that input (no SMA warm-up), so a
//! series without leading NaNs is valid from index 0.

/// Smoothing factor for a span.
pub fn alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Compute the EMA of an arbitrary series.
///
/// Leading NaN inputs produce NaN outputs until the first finite value seeds
/// the average. A NaN input after seeding yields NaN at that position and
/// leaves the running average untouched.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    assert!(span >= 1, "EMA span must be >= 1");
    let a = alpha(span);
    let mut result = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let ema = match prev {
            None => v,
            Some(p) => a * v + (1.0 - a) * p,
        };
        result[i] = ema;
        prev = Some(ema);
    }

    result
}
