use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::fit::FitResult;
use crate::math::drop_missing_pairs;
use crate::sample::Sample;
use crate::{Error, Result};

/// Number of archive slots in a session.
pub const MAX_CELLS: u8 = 16;

/// Column layout of the grid, as archived in cell snapshots. The indices are
/// the historical sheet layout and must not be reordered, or saved sessions
/// stop restoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Number = 0,
    Name = 1,
    Select = 2,
    Diameter = 3,
    Resistance = 4,
    Rns = 5,
    RnsError = 6,
    Drift = 7,
    Square = 8,
    RnSqrt = 9,
}

impl Column {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One archived grid entry: the raw text of a single cell of the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialDatum {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

fn datum(row: usize, col: Column, value: String) -> InitialDatum {
    InitialDatum {
        row,
        col: col.index(),
        value,
    }
}

fn format_opt<E: Display>(value: Option<E>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Snapshot the whole grid as `{row, col, value}` triples, one per column of
/// every row, derived columns included.
pub fn snapshot<E: Float + Display>(samples: &[Sample<E>]) -> Vec<InitialDatum> {
    let mut data = Vec::with_capacity(samples.len() * 10);
    for (row, s) in samples.iter().enumerate() {
        data.push(datum(row, Column::Number, s.number.to_string()));
        data.push(datum(row, Column::Name, s.name.clone()));
        data.push(datum(row, Column::Select, s.selected.to_string()));
        data.push(datum(row, Column::Diameter, format_opt(s.diameter)));
        data.push(datum(row, Column::Resistance, format_opt(s.resistance)));
        data.push(datum(row, Column::Rns, format_opt(s.rns)));
        data.push(datum(row, Column::RnsError, format_opt(s.rns_error)));
        data.push(datum(row, Column::Drift, format_opt(s.drift)));
        data.push(datum(row, Column::Square, format_opt(s.square)));
        data.push(datum(row, Column::RnSqrt, format_opt(s.rn_sqrt)));
    }
    data
}

/// Rebuild grid rows from an archived snapshot. Unknown columns are ignored
/// so snapshots from newer layouts still load.
///
/// # Errors
///
/// [`Error::Snapshot`] when a value does not parse back into its column.
pub fn samples_from_snapshot<E: Float + FromStr>(data: &[InitialDatum]) -> Result<Vec<Sample<E>>> {
    let rows = data.iter().map(|d| d.row + 1).max().unwrap_or(0);
    let mut samples: Vec<Sample<E>> = (0..rows).map(|row| Sample::new(row + 1, "")).collect();

    for d in data {
        let sample = &mut samples[d.row];
        let bad = || Error::Snapshot {
            row: d.row,
            col: d.col,
        };
        let parse_opt = || -> Result<Option<E>> {
            if d.value.is_empty() {
                return Ok(None);
            }
            d.value.parse::<E>().map(Some).map_err(|_| bad())
        };

        match d.col {
            c if c == Column::Number.index() => {
                sample.number = d.value.parse().map_err(|_| bad())?;
            }
            c if c == Column::Name.index() => sample.name = d.value.clone(),
            c if c == Column::Select.index() => {
                sample.selected = d.value.parse().map_err(|_| bad())?;
            }
            c if c == Column::Diameter.index() => sample.diameter = parse_opt()?,
            c if c == Column::Resistance.index() => sample.resistance = parse_opt()?,
            c if c == Column::Rns.index() => sample.rns = parse_opt()?,
            c if c == Column::RnsError.index() => sample.rns_error = parse_opt()?,
            c if c == Column::Drift.index() => sample.drift = parse_opt()?,
            c if c == Column::Square.index() => sample.square = parse_opt()?,
            c if c == Column::RnSqrt.index() => sample.rn_sqrt = parse_opt()?,
            _ => {}
        }
    }

    Ok(samples)
}

/// One archived measurement set: the fitted series, the run's results and a
/// snapshot of the raw grid it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell<E> {
    pub index: u8,
    pub name: String,
    pub diameter_list: Vec<E>,
    pub rn_sqrt_list: Vec<E>,
    pub result: FitResult<E>,
    pub initial_data: Vec<InitialDatum>,
}

impl<E: Float + Display> Cell<E> {
    /// Assemble a cell from the grid and the result of a successful run.
    ///
    /// # Errors
    ///
    /// Propagates the pair filter's length check; it cannot fire for columns
    /// taken from the same grid.
    pub fn from_run(
        index: u8,
        name: impl Into<String>,
        samples: &[Sample<E>],
        result: FitResult<E>,
    ) -> Result<Self> {
        let diameters: Vec<Option<E>> = samples.iter().map(|s| s.diameter).collect();
        let rn_sqrts: Vec<Option<E>> = samples.iter().map(|s| s.rn_sqrt).collect();
        let (diameter_list, rn_sqrt_list) = drop_missing_pairs(&diameters, &rn_sqrts)?;

        Ok(Self {
            index,
            name: name.into(),
            diameter_list,
            rn_sqrt_list,
            result,
            initial_data: snapshot(samples),
        })
    }
}

/// The session's keyed collection of archived cells: 16 slots, upsert by
/// index, names unique across slots, cleared as a whole.
#[derive(Clone, Debug, Default)]
pub struct CellBank<E> {
    cells: BTreeMap<u8, Cell<E>>,
}

impl<E> CellBank<E> {
    pub fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    /// Write a cell into its slot, replacing any previous content of that
    /// slot. Last write wins per index.
    ///
    /// # Errors
    ///
    /// - [`Error::CellIndex`] when the index is outside `1..=16`.
    /// - [`Error::DuplicateCellName`] when another slot already uses the
    ///   name. Rewriting a slot under its own name is fine.
    pub fn update_or_create(&mut self, cell: Cell<E>) -> Result<()> {
        if cell.index < 1 || cell.index > MAX_CELLS {
            return Err(Error::CellIndex { index: cell.index });
        }
        if self
            .cells
            .values()
            .any(|existing| existing.index != cell.index && existing.name == cell.name)
        {
            return Err(Error::DuplicateCellName { name: cell.name });
        }
        self.cells.insert(cell.index, cell);
        Ok(())
    }

    pub fn get(&self, index: u8) -> Option<&Cell<E>> {
        self.cells.get(&index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Cell<E>> {
        self.cells.values().find(|cell| cell.name == name)
    }

    /// Drop every archived cell. Slots are never deleted one at a time.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell<E>> {
        self.cells.values()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::fit::FitResult;
    use crate::sample::Sample;
    use crate::Error;

    use super::{samples_from_snapshot, snapshot, Cell, CellBank};

    fn result(tag: f64) -> FitResult<f64> {
        FitResult {
            slope: tag,
            intercept: -1.0,
            drift: 2.0,
            rns: 3.0,
            rns_error: 0.1,
            drift_error: 0.0,
            real_areas: vec![],
            rn_consistent: 0.0,
            allowed_error_percent: 5.0,
        }
    }

    fn cell(index: u8, name: &str) -> Cell<f64> {
        Cell::from_run(index, name, &[], result(1.0)).unwrap()
    }

    #[test]
    fn rewriting_a_slot_replaces_its_content() {
        let mut bank = CellBank::new();
        bank.update_or_create(cell(3, "wafer-a")).unwrap();

        let mut replacement = cell(3, "wafer-a");
        replacement.result = result(9.0);
        bank.update_or_create(replacement).unwrap();

        assert_eq!(bank.len(), 1);
        approx::assert_relative_eq!(bank.get(3).unwrap().result.slope, 9.0);
    }

    #[test]
    fn names_are_unique_across_slots() {
        let mut bank = CellBank::new();
        bank.update_or_create(cell(1, "wafer-a")).unwrap();

        match bank.update_or_create(cell(2, "wafer-a")) {
            Err(Error::DuplicateCellName { name }) => assert_eq!(name, "wafer-a"),
            other => panic!("expected a duplicate name error, got {other:?}"),
        }
    }

    #[test]
    fn indices_outside_the_bank_are_rejected() {
        let mut bank = CellBank::new();
        assert!(matches!(
            bank.update_or_create(cell(0, "a")),
            Err(Error::CellIndex { index: 0 })
        ));
        assert!(matches!(
            bank.update_or_create(cell(17, "b")),
            Err(Error::CellIndex { index: 17 })
        ));
    }

    #[test]
    fn clearing_drops_every_slot_at_once() {
        let mut bank = CellBank::new();
        bank.update_or_create(cell(1, "a")).unwrap();
        bank.update_or_create(cell(2, "b")).unwrap();

        bank.clear();

        assert!(bank.is_empty());
        assert!(bank.get(1).is_none());
        assert!(bank.get_by_name("b").is_none());
    }

    #[test]
    fn a_snapshot_restores_the_grid_it_was_taken_from() {
        let mut a: Sample<f64> = Sample::new(1, "first");
        a.diameter = Some(10.0);
        a.resistance = Some(400.0);
        a.rn_sqrt = Some(0.05);
        let mut b: Sample<f64> = Sample::new(2, "second");
        b.selected = false;

        let restored = samples_from_snapshot(&snapshot(&[a.clone(), b.clone()])).unwrap();

        assert_eq!(restored, vec![a, b]);
    }
}
