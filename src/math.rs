use ndarray::ArrayView1;
use num_traits::{Float, Zero};

use crate::{Error, Result};

/// The pair filter treats an exact `0.0` the same as a blank entry.
///
/// This mirrors how every generation of the tool has filtered its columns
/// before fitting: a legitimate zero measurement is indistinguishable from
/// "not entered" and is dropped. Saved data relies on this, so a
/// reimplementation must not "fix" it. Non-finite values are dropped for the
/// same reason.
pub const MISSING_SENTINEL_INCLUDES_ZERO: bool = true;

fn present<E: Float>(value: Option<E>) -> Option<E> {
    value.filter(|v| v.is_finite() && !v.is_zero())
}

/// Filter two paired columns down to the indices where both carry a value.
///
/// A value is "missing" when it is `None`, non-finite, or exactly zero (see
/// [`MISSING_SENTINEL_INCLUDES_ZERO`]). Order is preserved. Zero surviving
/// pairs is a legal result; callers decide whether that is enough data.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when the columns differ in length.
///
/// # Examples
///
/// ```
/// use rns_fit::math::drop_missing_pairs;
///
/// let diameters = [Some(10.0), None, Some(30.0), Some(40.0)];
/// let rn_sqrts = [Some(0.1), Some(0.2), Some(0.0), Some(0.4)];
/// let (xs, ys) = drop_missing_pairs(&diameters, &rn_sqrts).unwrap();
///
/// assert_eq!(xs, vec![10.0, 40.0]);
/// assert_eq!(ys, vec![0.1, 0.4]);
/// ```
pub fn drop_missing_pairs<E: Float>(
    xs: &[Option<E>],
    ys: &[Option<E>],
) -> Result<(Vec<E>, Vec<E>)> {
    if xs.len() != ys.len() {
        return Err(Error::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }

    let pairs = xs
        .iter()
        .zip(ys)
        .filter_map(|(&x, &y)| present(x).zip(present(y)));

    Ok(pairs.unzip())
}

/// Arithmetic mean of a slice.
///
/// # Panics
///
/// Panics when the slice is empty or its length does not fit in `E`.
pub fn mean<E: Float>(xs: &[E]) -> E {
    assert!(!xs.is_empty(), "mean of an empty slice");
    let n = E::from(xs.len()).expect("length fits in a float");
    xs.iter().fold(E::zero(), |acc, &x| acc + x) / n
}

/// Sample standard deviation about a precomputed mean, with Bessel's
/// correction (`n - 1` denominator).
///
/// # Panics
///
/// Panics when fewer than two values are given.
pub fn sample_std<E: Float>(xs: &[E], mean: E) -> E {
    assert!(xs.len() >= 2, "sample_std needs at least two values");
    let normalizer = E::from(xs.len() - 1).expect("length fits in a float");
    let sum_sq = xs
        .iter()
        .fold(E::zero(), |acc, &x| acc + (x - mean).powi(2));
    (sum_sq / normalizer).sqrt()
}

/// Root-mean-square deviation of `values` about `center`, `n` denominator.
///
/// Returns `None` for an empty slice; the pipeline maps that onto
/// [`Error::EmptyAggregate`] with the name of the parameter being computed.
pub fn rms_deviation<E: Float>(values: &[E], center: E) -> Option<E> {
    if values.is_empty() {
        return None;
    }
    let n = E::from(values.len()).expect("length fits in a float");
    let view = ArrayView1::from(values);
    let sum_sq = view.mapv(|v| (v - center).powi(2)).sum();
    Some((sum_sq / n).sqrt())
}
