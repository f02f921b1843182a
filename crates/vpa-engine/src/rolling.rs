//! Incremental rolling statistics shared by the processor and the
//! window-based analyzers. All outputs are full-length and aligned to the
//! input index; warmup slots are NaN.

/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

/// Trailing simple mean over `window` observations, computed with a single
/// running sum. The first `window - 1` slots are NaN.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; data.len()];
    if window == 0 || data.len() < window {
        return out;
    }

    let mut sum = 0.0;
    for i in 0..data.len() {
        sum += data[i];
        if i >= window {
            sum -= data[i - window];
        }
        if i + 1 >= window {
            out[i] = sum / window as f64;
        }
    }
    out
}

/// Exponential moving average, SMA-seeded, always returning one value per
/// input element so callers can index it against the source series.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return vec![f64::NAN; data.len()];
    }

    if data.len() < period {
        // Not enough data for a full SMA seed: hold the running mean.
        let mut out = Vec::with_capacity(data.len());
        let mut sum = 0.0;
        for (i, value) in data.iter().enumerate() {
            sum += value;
            out.push(finite_or(sum / (i + 1) as f64, 0.0));
        }
        return out;
    }

    let seed = finite_or(data[..period].iter().sum::<f64>() / period as f64, 0.0);
    let mut out = vec![seed; period];
    let multiplier = 2.0 / (period as f64 + 1.0);

    for i in period..data.len() {
        let prev = out[i - 1];
        out.push(finite_or((data[i] - prev) * multiplier + prev, prev));
    }
    out
}

/// Indices that are strict local minima over a symmetric `window`.
pub fn pivot_lows(values: &[f64], window: usize) -> Vec<usize> {
    pivots(values, window, |candidate, other| candidate < other)
}

/// Indices that are strict local maxima over a symmetric `window`.
pub fn pivot_highs(values: &[f64], window: usize) -> Vec<usize> {
    pivots(values, window, |candidate, other| candidate > other)
}

fn pivots(values: &[f64], window: usize, beats: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let mut out = Vec::new();
    if window == 0 || values.len() < 2 * window + 1 {
        return out;
    }
    for i in window..values.len() - window {
        let candidate = values[i];
        let is_pivot = (i - window..i)
            .chain(i + 1..=i + window)
            .all(|j| beats(candidate, values[j]));
        if is_pivot {
            out.push(i);
        }
    }
    out
}

/// Is `index` a strict local extremum given the full series? Used by the
/// Wyckoff analyzer for swing confirmation.
pub fn is_pivot_low(values: &[f64], index: usize, window: usize) -> bool {
    if index < window || index + window >= values.len() {
        return false;
    }
    (index - window..index)
        .chain(index + 1..=index + window)
        .all(|j| values[index] < values[j])
}

pub fn is_pivot_high(values: &[f64], index: usize, window: usize) -> bool {
    if index < window || index + window >= values.len() {
        return false;
    }
    (index - window..index)
        .chain(index + 1..=index + window)
        .all(|j| values[index] > values[j])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_mean(&data, 3);

        assert_eq!(result.len(), 5);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 1e-12);
        assert!((result[3] - 3.0).abs() < 1e-12);
        assert!((result[4] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_mean_short_series_is_all_nan() {
        let result = rolling_mean(&[1.0, 2.0], 5);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn ema_is_seeded_with_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        let seed = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[0] - seed).abs() < 1e-12);
        assert!((result[2] - seed).abs() < 1e-12);
        assert!(result[4] > result[2]);
    }

    #[test]
    fn pivots_find_strict_extrema() {
        let values = vec![5.0, 4.0, 3.0, 4.0, 5.0, 6.0, 5.0, 4.0];
        assert_eq!(pivot_lows(&values, 2), vec![2]);
        assert_eq!(pivot_highs(&values, 2), vec![5]);
        assert!(is_pivot_low(&values, 2, 2));
        assert!(!is_pivot_low(&values, 3, 2));
        assert!(is_pivot_high(&values, 5, 2));
    }

    #[test]
    fn equal_neighbors_break_pivots() {
        let values = vec![3.0, 2.0, 2.0, 3.0, 3.0];
        assert!(pivot_lows(&values, 1).is_empty());
        assert!(pivot_highs(&values, 1).is_empty());
    }
}
