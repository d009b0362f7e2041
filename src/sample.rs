use std::fs;
use std::path::Path;

use num_traits::float::FloatConst;
use num_traits::{Float, Zero};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Error, Result};

/// One grid row: the operator-entered readings for a single test structure
/// plus the fields derived from the last successful calculation run.
///
/// Derived fields are only ever populated for rows that are `selected` and
/// carry both a diameter and a resistance; a run clears them first, so a
/// value present here is always consistent with the current readings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample<E> {
    pub number: usize,
    pub name: String,
    pub selected: bool,
    /// ACAD diameter in μm.
    pub diameter: Option<E>,
    /// Normal-state resistance in Ω.
    pub resistance: Option<E>,
    pub rn_sqrt: Option<E>,
    pub rns: Option<E>,
    pub rns_error: Option<E>,
    pub drift: Option<E>,
    /// Structure area in μm².
    pub square: Option<E>,
    pub flag: Option<Tolerance>,
}

/// Whether a sample's RnS deviation stays within the operator's allowance.
/// Consumed by the grid to recolor the row; it mutates no numeric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tolerance {
    Within,
    Exceeded,
}

impl<E: Float> Sample<E> {
    pub fn new(number: usize, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            selected: true,
            diameter: None,
            resistance: None,
            rn_sqrt: None,
            rns: None,
            rns_error: None,
            drift: None,
            square: None,
            flag: None,
        }
    }

    /// The (diameter, resistance) pair, when this row takes part in a run:
    /// it must be selected and both readings must be entered and non-zero.
    pub fn measured(&self) -> Option<(E, E)> {
        if !self.selected {
            return None;
        }
        let diameter = self.diameter.filter(|d| d.is_finite() && !d.is_zero())?;
        let resistance = self.resistance.filter(|r| r.is_finite() && !r.is_zero())?;
        Some((diameter, resistance))
    }

    pub fn clear_derived(&mut self) {
        self.rn_sqrt = None;
        self.rns = None;
        self.rns_error = None;
        self.drift = None;
        self.square = None;
        self.flag = None;
    }
}

/// The transformed resistance `1/sqrt(R + rn_consistent)`, the y-axis of the
/// fit. Returns `None` when `R + rn_consistent <= 0`: the square root has no
/// real value and the row is left blank rather than carrying a NaN. That is
/// a row-local condition and never aborts a run.
pub fn rn_sqrt<E: Float>(resistance: E, rn_consistent: E) -> Option<E> {
    let sum = resistance + rn_consistent;
    if sum <= E::zero() {
        return None;
    }
    Some(sum.sqrt().recip())
}

/// Per-sample RnS, `(R + rn_persistent)·π/4·(D − drift)²`.
pub fn rns_per_sample<E: Float + FloatConst>(
    resistance: E,
    diameter: E,
    drift: E,
    rn_persistent: E,
) -> E {
    (resistance + rn_persistent) * E::FRAC_PI_4() * (diameter - drift).powi(2)
}

/// Real structure area, `π/4·(D − drift)²`.
pub fn square<E: Float + FloatConst>(diameter: E, drift: E) -> E {
    E::FRAC_PI_4() * (diameter - drift).powi(2)
}

/// Absolute deviation of one sample's RnS from the fitted RnS.
pub fn rns_error_per_sample<E: Float>(rns_i: E, rns_mean: E) -> E {
    (rns_i - rns_mean).abs()
}

/// Per-sample drift, `D − sqrt(4·rns/((R + rn_persistent)·π))`. Only the
/// historical per-sample pipeline variant stores this; the current one keeps
/// a single global drift.
pub fn drift_per_sample<E: Float + FloatConst>(
    diameter: E,
    resistance: E,
    rns: E,
    rn_persistent: E,
) -> E {
    let four = E::from(4.0).expect("4 fits in a float");
    diameter - (four * rns / (resistance + rn_persistent) / E::PI()).sqrt()
}

#[derive(Deserialize)]
struct Row<E> {
    number: usize,
    name: String,
    selected: bool,
    diameter: Option<E>,
    resistance: Option<E>,
}

/// Read a grid of samples from a headed CSV file with columns
/// `number,name,selected,diameter,resistance`. Blank diameter or resistance
/// fields become empty readings, not zeros.
///
/// # Errors
///
/// Returns an error when the file is missing or a record does not parse.
pub fn from_file<E: Float + DeserializeOwned>(filepath: &Path) -> Result<Vec<Sample<E>>> {
    if !filepath.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("requested file not found: {}", filepath.display()),
        )));
    }

    let file = fs::read(filepath)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&file[..]);

    let mut samples = vec![];
    for result in rdr.deserialize() {
        let record: Row<E> = result?;
        let mut sample = Sample::new(record.number, record.name);
        sample.selected = record.selected;
        sample.diameter = record.diameter;
        sample.resistance = record.resistance;
        samples.push(sample);
    }

    Ok(samples)
}
