use num_traits::float::FloatConst;
use num_traits::{Float, Zero};
use serde::{Deserialize, Serialize};

use crate::math::{mean, sample_std};
use crate::{Error, Result};

/// A fitted straight line through the (diameter, rn_sqrt) cloud.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line<E> {
    pub slope: E,
    pub intercept: E,
}

impl<E: Float + FloatConst> Line<E> {
    pub fn y(&self, x: E) -> E {
        x * self.slope + self.intercept
    }

    /// The drift is the x-intercept of the fitted line, `-intercept/slope`.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroSlope`] when the line is horizontal.
    pub fn drift(&self) -> Result<E> {
        if self.slope.is_zero() {
            return Err(Error::ZeroSlope);
        }
        Ok(-self.intercept / self.slope)
    }

    /// The RnS product derived from the slope, `π/(4·slope²)`.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroSlope`] when the line is horizontal.
    pub fn rns(&self) -> Result<E> {
        if self.slope.is_zero() {
            return Err(Error::ZeroSlope);
        }
        Ok(E::FRAC_PI_4() / self.slope.powi(2))
    }
}

/// Least-squares line through paired observations, via the Pearson
/// correlation formulation: `slope = r · std_y / std_x`, with the standard
/// deviations Bessel-corrected.
///
/// # Errors
///
/// - [`Error::LengthMismatch`] when the slices differ in length.
/// - [`Error::InsufficientData`] when fewer than two pairs are given. The
///   pipeline checks this before calling, so hitting it here means a caller
///   skipped the pair filter.
/// - [`Error::DegenerateFit`] when either axis has zero variance; the
///   correlation would be `0/0` and must not leak downstream as NaN.
pub fn linear_fit<E: Float>(xs: &[E], ys: &[E]) -> Result<Line<E>> {
    if xs.len() != ys.len() {
        return Err(Error::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    if xs.len() < 2 {
        return Err(Error::InsufficientData { found: xs.len() });
    }

    let m_x = mean(xs);
    let m_y = mean(ys);

    let mut sum_xy = E::zero();
    let mut sum_sq_x = E::zero();
    let mut sum_sq_y = E::zero();
    for (&x, &y) in xs.iter().zip(ys) {
        let var_x = x - m_x;
        let var_y = y - m_y;
        sum_xy = sum_xy + var_x * var_y;
        sum_sq_x = sum_sq_x + var_x.powi(2);
        sum_sq_y = sum_sq_y + var_y.powi(2);
    }

    if sum_sq_x.is_zero() {
        return Err(Error::DegenerateFit { axis: "diameter" });
    }
    if sum_sq_y.is_zero() {
        return Err(Error::DegenerateFit { axis: "rn_sqrt" });
    }

    let r = sum_xy / (sum_sq_x * sum_sq_y).sqrt();
    let slope = r * (sample_std(ys, m_y) / sample_std(xs, m_x));
    let intercept = m_y - slope * m_x;

    Ok(Line { slope, intercept })
}

/// Real area of a structure with nominal area `S`, corrected for the
/// difference between the planned and the fitted drift:
/// `π/4·(sqrt(4·S/π) + planned_drift − drift)²`.
pub fn real_area<E: Float + FloatConst>(area_nominal: E, planned_drift: E, drift: E) -> E {
    let four = E::from(4.0).expect("4 fits in a float");
    let equivalent_diameter = (four * area_nominal / E::PI()).sqrt();
    E::FRAC_PI_4() * (equivalent_diameter + planned_drift - drift).powi(2)
}

/// The full outcome of one calculation run, as shown in the parameter table
/// and archived into a cell.
///
/// `real_areas` holds one entry per configured nominal area, in the order
/// they were configured; it is empty when none are set. The last two fields
/// pass the operator inputs through so an archived cell can reproduce the
/// run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult<E> {
    pub slope: E,
    pub intercept: E,
    pub drift: E,
    pub rns: E,
    pub rns_error: E,
    pub drift_error: E,
    pub real_areas: Vec<E>,
    pub rn_consistent: E,
    pub allowed_error_percent: E,
}

impl<E: Copy> FitResult<E> {
    pub fn line(&self) -> Line<E> {
        Line {
            slope: self.slope,
            intercept: self.intercept,
        }
    }
}
