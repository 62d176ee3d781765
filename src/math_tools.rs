//! Small numerical helpers shared by the projection and aggregation modules:
//! mean, population standard deviation, median and half-to-even rounding.

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`). Returns NaN for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median of the values, reordering them in place.
///
/// For an even count the two middle values are averaged. Returns NaN for an
/// empty slice.
pub fn median_mut(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Largest value, ignoring NaN. Returns NaN when nothing else is left.
pub fn max_ignoring_nan(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

/// Half of `window`, rounded half to even (`1 -> 0`, `3 -> 2`, `5 -> 2`).
pub fn half_window(window: usize) -> usize {
    (window as f64 / 2.0).round_ties_even() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&values), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(std_dev(&values), 2.0, epsilon = 1e-12);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_median() {
        assert_eq!(median_mut(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_mut(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median_mut(&mut []).is_nan());
    }

    #[test]
    fn test_max_ignoring_nan() {
        assert_eq!(max_ignoring_nan(&[1.0, f64::NAN, 3.0]), 3.0);
        assert!(max_ignoring_nan(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_half_window() {
        let halves: Vec<usize> = (0..7).map(half_window).collect();
        assert_eq!(halves, vec![0, 0, 1, 2, 2, 2, 3]);
    }
}
