use std::fmt;

/// Failure modes of the calculation pipeline and its collaborators.
///
/// Every variant is recoverable: a failing run aborts at the step where the
/// error occurred and the reason is surfaced to the operator. Nothing here is
/// process-fatal, and no step is retried automatically.
#[derive(Debug)]
pub enum Error {
    /// Fewer than two valid (diameter, rn_sqrt) pairs survived filtering.
    InsufficientData { found: usize },
    /// Zero variance along one axis of the fit, the correlation is undefined.
    DegenerateFit { axis: &'static str },
    /// A slope of zero admits neither a drift nor an RnS value.
    ZeroSlope,
    /// Paired columns of different lengths. An integration bug in the caller,
    /// never silently truncated.
    LengthMismatch { left: usize, right: usize },
    /// An RMS aggregate over zero samples, the denominator would be zero.
    EmptyAggregate { parameter: &'static str },
    /// Cell index outside the `1..=16` bank.
    CellIndex { index: u8 },
    /// A cell name already used by a different slot of the bank.
    DuplicateCellName { name: String },
    /// A grid snapshot entry whose value does not parse back into its column.
    Snapshot { row: usize, col: usize },
    Io(std::io::Error),
    Csv(csv::Error),
    Config(toml::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData { found } => write!(
                f,
                "insufficient data: the fit needs at least 2 valid (diameter, rn_sqrt) pairs, found {found}"
            ),
            Self::DegenerateFit { axis } => {
                write!(f, "degenerate fit: zero variance along the {axis} axis")
            }
            Self::ZeroSlope => write!(f, "fitted slope is zero, drift and RnS are undefined"),
            Self::LengthMismatch { left, right } => {
                write!(f, "paired columns differ in length: {left} vs {right}")
            }
            Self::EmptyAggregate { parameter } => {
                write!(f, "cannot compute {parameter}: no samples carry a value")
            }
            Self::CellIndex { index } => {
                write!(f, "cell index {index} outside the bank range 1..=16")
            }
            Self::DuplicateCellName { name } => {
                write!(f, "cell name {name:?} already used by another slot")
            }
            Self::Snapshot { row, col } => {
                write!(f, "snapshot value at row {row}, column {col} does not parse")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e)
    }
}
