use itertools::Itertools;
use num_traits::float::FloatConst;
use num_traits::Float;

use crate::fit::Line;
use crate::{Error, Result};

/// Series ready for the plot widget: the measured points sorted by diameter,
/// and the fit line sampled at the same diameters but extended so it crosses
/// its x-intercept at the drift.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotData<E> {
    pub points: Vec<(E, E)>,
    pub fit: Vec<(E, E)>,
}

/// Prepare scatter and fit-line series from filtered (diameter, rn_sqrt)
/// columns. Both series are empty when no pairs are given.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when the columns differ in length.
pub fn scatter_with_fit<E: Float + FloatConst>(
    diameters: &[E],
    rn_sqrts: &[E],
    line: &Line<E>,
    drift: E,
) -> Result<PlotData<E>> {
    if diameters.len() != rn_sqrts.len() {
        return Err(Error::LengthMismatch {
            left: diameters.len(),
            right: rn_sqrts.len(),
        });
    }

    let points: Vec<(E, E)> = diameters
        .iter()
        .copied()
        .zip(rn_sqrts.iter().copied())
        .sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .collect();

    if points.is_empty() {
        return Ok(PlotData {
            points,
            fit: vec![],
        });
    }

    let mut fit_x: Vec<E> = points.iter().map(|&(x, _)| x).collect();
    if fit_x[0] > drift {
        fit_x.insert(0, drift);
    }
    if fit_x[fit_x.len() - 1] < drift {
        fit_x.push(drift);
    }

    let fit = fit_x.into_iter().map(|x| (x, line.y(x))).collect();

    Ok(PlotData { points, fit })
}
