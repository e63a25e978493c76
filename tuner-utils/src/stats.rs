/// Percentile with linear interpolation between the two closest ranks.
///
/// `sorted` must be in ascending order. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pct = pct.clamp(0.0, 100.0);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Ascending copy of `values` with exact zeros removed.
pub fn sorted_nonzero<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut out: Vec<f64> = values.into_iter().copied().filter(|v| *v != 0.0).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

pub fn sum_of_squares<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    values.into_iter().map(|v| v * v).sum()
}

/// Max and min over the last `window` entries of `history`.
pub fn tail_extrema(history: &[f64], window: usize) -> Option<(f64, f64)> {
    let start = history.len().saturating_sub(window);
    let tail = &history[start..];
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().fold((f64::NEG_INFINITY, f64::INFINITY), |(max, min), &v| {
        (max.max(v), min.min(v))
    }))
}
