use num_traits::float::FloatConst;
use num_traits::Float;

use crate::config::{Config, DriftErrorMode};
use crate::fit::{linear_fit, real_area, FitResult, Line};
use crate::math::{drop_missing_pairs, rms_deviation};
use crate::sample::{self, Sample, Tolerance};
use crate::{Error, Result};

/// Run the full calculation over the grid, in strict sequence: clear derived
/// fields, Rn transform, linear fit with the main derived parameters,
/// per-sample recompute, then the error aggregates and tolerance flags.
///
/// The first failing step aborts the run; later steps never see partial
/// state. Because derived fields are cleared up front, an aborted run leaves
/// them cleared rather than stale. The one exception is the Rn transform's
/// domain check (`R + rn_consistent <= 0`), which blanks the offending row
/// and carries on.
///
/// Calls are synchronous and single-threaded; re-running mid-run is the
/// caller's responsibility to prevent.
///
/// # Errors
///
/// - [`Error::InsufficientData`] when fewer than two valid pairs survive.
/// - [`Error::DegenerateFit`] when either fitted axis has zero variance.
/// - [`Error::ZeroSlope`] when the fitted line is horizontal.
/// - [`Error::EmptyAggregate`] when no sample carries an RnS to aggregate.
pub fn run<E: Float + FloatConst>(
    samples: &mut [Sample<E>],
    config: &Config<E>,
) -> Result<FitResult<E>> {
    for sample in samples.iter_mut() {
        sample.clear_derived();
    }

    transform_rn_sqrt(samples, config.rn_consistent);

    let (line, drift, rns) = main_params(samples)?;
    let real_areas = config
        .nominal_areas
        .iter()
        .map(|&nominal| real_area(nominal, config.planned_drift, drift))
        .collect();

    recompute_per_sample(samples, drift, rns, config);

    let (rns_error, drift_error) = error_params(samples, rns, drift, config)?;

    Ok(FitResult {
        slope: line.slope,
        intercept: line.intercept,
        drift,
        rns,
        rns_error,
        drift_error,
        real_areas,
        rn_consistent: config.rn_consistent,
        allowed_error_percent: config.allowed_error_percent,
    })
}

fn transform_rn_sqrt<E: Float>(samples: &mut [Sample<E>], rn_consistent: E) {
    for sample in samples.iter_mut() {
        if let Some((_, resistance)) = sample.measured() {
            sample.rn_sqrt = sample::rn_sqrt(resistance, rn_consistent);
        }
    }
}

fn main_params<E: Float + FloatConst>(samples: &[Sample<E>]) -> Result<(Line<E>, E, E)> {
    let diameters: Vec<Option<E>> = samples.iter().map(|s| s.diameter).collect();
    let rn_sqrts: Vec<Option<E>> = samples.iter().map(|s| s.rn_sqrt).collect();
    let (xs, ys) = drop_missing_pairs(&diameters, &rn_sqrts)?;
    if xs.len() < 2 {
        return Err(Error::InsufficientData { found: xs.len() });
    }

    let line = linear_fit(&xs, &ys)?;
    let drift = line.drift()?;
    let rns = line.rns()?;
    Ok((line, drift, rns))
}

fn recompute_per_sample<E: Float + FloatConst>(
    samples: &mut [Sample<E>],
    drift: E,
    rns: E,
    config: &Config<E>,
) {
    for s in samples.iter_mut() {
        let Some((diameter, resistance)) = s.measured() else {
            continue;
        };
        // A row blanked by the Rn transform's domain check stays blank.
        if s.rn_sqrt.is_none() {
            continue;
        }
        s.square = Some(sample::square(diameter, drift));
        s.rns = Some(sample::rns_per_sample(
            resistance,
            diameter,
            drift,
            config.rn_consistent,
        ));
        if config.drift_error == DriftErrorMode::PerSample {
            s.drift = Some(sample::drift_per_sample(
                diameter,
                resistance,
                rns,
                config.rn_consistent,
            ));
        }
    }
}

fn error_params<E: Float>(
    samples: &mut [Sample<E>],
    rns: E,
    drift: E,
    config: &Config<E>,
) -> Result<(E, E)> {
    let rns_list: Vec<E> = samples.iter().filter_map(|s| s.rns).collect();
    let rns_error = rms_deviation(&rns_list, rns).ok_or(Error::EmptyAggregate {
        parameter: "rns_error",
    })?;

    for s in samples.iter_mut() {
        let Some(rns_i) = s.rns else { continue };
        let deviation = sample::rns_error_per_sample(rns_i, rns);
        s.rns_error = Some(deviation);
        s.flag = Some(
            if config
                .tolerance
                .exceeded(deviation, rns, rns_error, config.allowed_error_percent)
            {
                Tolerance::Exceeded
            } else {
                Tolerance::Within
            },
        );
    }

    let drift_error = match config.drift_error {
        DriftErrorMode::GlobalOnly => E::zero(),
        DriftErrorMode::PerSample => {
            let drifts: Vec<E> = samples.iter().filter_map(|s| s.drift).collect();
            // An empty or non-finite spread collapses to zero, as the
            // historical tool reported it.
            rms_deviation(&drifts, drift)
                .filter(|e| e.is_finite())
                .unwrap_or_else(E::zero)
        }
    };

    Ok((rns_error, drift_error))
}
