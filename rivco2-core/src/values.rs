//! Missing-value handling and missing-aware statistics
//!
//! Quantities that are undefined for a reach (the width of a lake, the residence
//! time of a reach without flow, ...) are represented by [`MISSING`], a NaN.
//! NaN propagates through arithmetic so anything derived from a missing input is
//! itself missing, never silently zero.
//!
//! Aggregates go the other way: every reduction in this module operates only on
//! the defined subset of its input, and returns [`MISSING`] when that subset is
//! empty.
//!
//! ```rust
//! use rivco2_core::values::{nan_mean, nan_sum, MISSING};
//!
//! let values = [1.0, MISSING, 3.0];
//! assert_eq!(nan_sum(&values), 4.0);
//! assert_eq!(nan_mean(&values), 2.0);
//! assert!(nan_sum(&[MISSING]).is_nan());
//! ```

use num::Float;

/// Floating point type used for all physical quantities.
pub type FloatValue = f64;

/// Sentinel for a value that is undefined or not applicable.
pub const MISSING: FloatValue = f64::NAN;

/// Test whether a value is the missing sentinel
pub fn is_missing<T: Float>(value: T) -> bool {
    value.is_nan()
}

/// Iterate over the defined (non-missing) values of a slice
pub fn defined<T: Float>(values: &[T]) -> impl Iterator<Item = T> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

/// Number of defined values
pub fn count_defined<T: Float>(values: &[T]) -> usize {
    defined(values).count()
}

/// Sum of the defined values, or missing if there are none
pub fn nan_sum<T: Float>(values: &[T]) -> T {
    let mut any = false;
    let total = defined(values).fold(T::zero(), |acc, v| {
        any = true;
        acc + v
    });
    if any {
        total
    } else {
        T::nan()
    }
}

/// Arithmetic mean of the defined values, or missing if there are none
pub fn nan_mean<T: Float>(values: &[T]) -> T {
    let (total, n) = defined(values).fold((T::zero(), 0usize), |(acc, n), v| (acc + v, n + 1));
    match T::from(n) {
        Some(count) if n > 0 => total / count,
        _ => T::nan(),
    }
}

/// Median of the defined values, or missing if there are none
///
/// An even number of values returns the mean of the two central values.
pub fn nan_median<T: Float>(values: &[T]) -> T {
    let mut sorted: Vec<T> = defined(values).collect();
    if sorted.is_empty() {
        return T::nan();
    }
    // NaN has been filtered so the comparison is total
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let two = T::one() + T::one();
        (sorted[mid - 1] + sorted[mid]) / two
    }
}

/// Maximum of the defined values together with its position in the slice
pub fn nan_argmax<T: Float>(values: &[T]) -> Option<(usize, T)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
