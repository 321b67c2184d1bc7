#![forbid(unsafe_code)]

/// Spacing used when keys are appended or rewritten in bulk.
pub const SORT_KEY_STEP: f64 = 1.0;

/// A key strictly between two neighbour keys. `None` means the float space
/// between them is exhausted and the list needs a bulk rewrite first.
pub fn key_between(prev: Option<f64>, next: Option<f64>) -> Option<f64> {
    let key = match (prev, next) {
        (None, None) => 0.0,
        (Some(prev), None) => prev + SORT_KEY_STEP,
        (None, Some(next)) => next - SORT_KEY_STEP,
        (Some(prev), Some(next)) => prev + (next - prev) / 2.0,
    };
    let above = prev.is_none_or(|prev| key > prev);
    let below = next.is_none_or(|next| key < next);
    (key.is_finite() && above && below).then_some(key)
}

/// Evenly spaced keys for a bulk rewrite of `len` rows.
pub fn dense_keys(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * SORT_KEY_STEP).collect()
}
