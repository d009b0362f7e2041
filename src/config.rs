use std::fs;
use std::path::Path;

use num_traits::{Float, Zero};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Operator inputs for a calculation run, loadable from a TOML file.
///
/// Every field has a default, so a config file only needs the values the
/// operator wants to change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    default,
    bound(deserialize = "E: Float + Deserialize<'de>", serialize = "E: Serialize")
)]
pub struct Config<E> {
    /// Series resistance offset added before the Rn transform, in Ω.
    pub rn_consistent: E,
    /// Allowed per-sample RnS deviation, in percent of the fitted RnS.
    pub allowed_error_percent: E,
    pub tolerance: TolerancePolicy,
    pub drift_error: DriftErrorMode,
    /// Drift the layout was designed for, used by the real-area correction.
    pub planned_drift: E,
    /// Nominal structure areas (μm²) to correct for the fitted drift.
    pub nominal_areas: Vec<E>,
}

impl<E: Float> Default for Config<E> {
    fn default() -> Self {
        Self {
            rn_consistent: E::zero(),
            allowed_error_percent: E::from(5.0).expect("5 fits in a float"),
            tolerance: TolerancePolicy::default(),
            drift_error: DriftErrorMode::default(),
            planned_drift: E::one(),
            nominal_areas: vec![],
        }
    }
}

impl<E: Float + serde::de::DeserializeOwned> Config<E> {
    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// How a sample's RnS deviation is compared against the operator allowance.
///
/// The tool historically shipped two formulas; both are kept so archived
/// sessions recolor the same way they did when saved. `RelativePercent` is
/// the current behavior and the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TolerancePolicy {
    /// Deviation relative to the fitted RnS, in percent, against
    /// `allowed_error_percent`. A zero RnS makes the ratio infinite.
    #[default]
    RelativePercent,
    /// Absolute deviation against `rns_error · (1 + allowed/100)`.
    AbsoluteScaled,
}

impl TolerancePolicy {
    pub fn exceeded<E: Float>(
        self,
        deviation: E,
        rns_mean: E,
        rns_error: E,
        allowed_error_percent: E,
    ) -> bool {
        let hundred = E::from(100.0).expect("100 fits in a float");
        match self {
            Self::RelativePercent => {
                if rns_mean.is_zero() {
                    return true;
                }
                deviation / rns_mean * hundred > allowed_error_percent
            }
            Self::AbsoluteScaled => {
                deviation > rns_error * (E::one() + allowed_error_percent / hundred)
            }
        }
    }
}

/// Whether a run tracks drift per sample.
///
/// The newest generation of the tool computes drift once from the fit and
/// reports `drift_error == 0`; the historical one derived a drift per sample
/// and reported the RMS spread of those values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftErrorMode {
    #[default]
    GlobalOnly,
    PerSample,
}
