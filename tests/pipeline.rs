use std::f64::consts::FRAC_PI_4;

use tempdir::TempDir;

use rns_fit::cell::{samples_from_snapshot, Cell, CellBank};
use rns_fit::config::{Config, DriftErrorMode};
use rns_fit::math::drop_missing_pairs;
use rns_fit::pipeline::run;
use rns_fit::plot::scatter_with_fit;
use rns_fit::sample::{self, Sample, Tolerance};
use rns_fit::{Error, Result};

fn grid(readings: &[(f64, f64)]) -> Vec<Sample<f64>> {
    readings
        .iter()
        .enumerate()
        .map(|(ii, &(diameter, resistance))| {
            let mut s = Sample::new(ii + 1, format!("s{}", ii + 1));
            s.diameter = Some(diameter);
            s.resistance = Some(resistance);
            s
        })
        .collect()
}

/// Four points whose transformed resistances happen to sit exactly on a
/// line: `R = 10^4 / (d - 5)^2`, so `1/sqrt(R) = 0.01·(d - 5)`.
fn collinear_grid() -> Vec<Sample<f64>> {
    grid(&[(15.0, 100.0), (25.0, 25.0), (55.0, 4.0), (105.0, 1.0)])
}

fn reference_grid() -> Vec<Sample<f64>> {
    grid(&[(10.0, 400.0), (20.0, 225.0), (30.0, 100.0), (40.0, 25.0)])
}

#[test]
fn the_reference_grid_matches_the_pinned_golden_values() -> Result<()> {
    let mut samples = reference_grid();
    let config = Config::default();

    let result = run(&mut samples, &config)?;

    // Closed-form values for this grid: slope 29/6000, intercept -1/60.
    let slope = 29.0 / 6000.0;
    approx::assert_relative_eq!(result.slope, slope, max_relative = 1e-12);
    approx::assert_relative_eq!(result.intercept, -1.0 / 60.0, max_relative = 1e-12);
    approx::assert_relative_eq!(result.drift, 100.0 / 29.0, max_relative = 1e-12);
    approx::assert_relative_eq!(result.rns, FRAC_PI_4 / (slope * slope), max_relative = 1e-12);
    approx::assert_relative_eq!(result.rns_error, 16_969.581_872_013_71, max_relative = 1e-9);
    approx::assert_relative_eq!(result.drift_error, 0.0);

    let expected_rn_sqrt = [0.05, 1.0 / 15.0, 0.1, 0.2];
    for (s, expected) in samples.iter().zip(expected_rn_sqrt) {
        approx::assert_relative_eq!(s.rn_sqrt.unwrap(), expected, max_relative = 1e-12);
        let (diameter, resistance) = (s.diameter.unwrap(), s.resistance.unwrap());
        approx::assert_relative_eq!(
            s.rns.unwrap(),
            resistance * FRAC_PI_4 * (diameter - result.drift).powi(2),
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(
            s.square.unwrap(),
            FRAC_PI_4 * (diameter - result.drift).powi(2),
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(
            s.rns_error.unwrap(),
            (s.rns.unwrap() - result.rns).abs(),
            max_relative = 1e-12
        );
    }

    Ok(())
}

#[test]
fn constant_resistance_reports_a_degenerate_fit() {
    let mut samples = grid(&[(10.0, 100.0), (20.0, 100.0), (30.0, 100.0), (40.0, 100.0)]);
    let config = Config::default();

    match run(&mut samples, &config) {
        Err(Error::DegenerateFit { axis: "rn_sqrt" }) => {}
        other => panic!("expected a degenerate fit, got {other:?}"),
    }
    // No drift or RnS made it into the grid.
    assert!(samples.iter().all(|s| s.rns.is_none() && s.square.is_none()));
}

#[test]
fn an_unselected_row_neither_contributes_nor_gets_derived_values() -> Result<()> {
    let config = Config::default();

    let mut baseline = reference_grid();
    let expected = run(&mut baseline, &config)?;

    let mut samples = reference_grid();
    let mut extra = Sample::new(5, "ignored");
    extra.selected = false;
    extra.diameter = Some(50.0);
    extra.resistance = Some(11.0);
    samples.push(extra);

    let result = run(&mut samples, &config)?;

    assert_eq!(result, expected);
    let extra = &samples[4];
    assert!(extra.rn_sqrt.is_none());
    assert!(extra.rns.is_none());
    assert!(extra.rns_error.is_none());
    assert!(extra.square.is_none());
    assert!(extra.flag.is_none());

    Ok(())
}

#[test]
fn collinear_data_flags_every_row_within_tolerance() -> Result<()> {
    let mut samples = collinear_grid();
    let config = Config::default();

    let result = run(&mut samples, &config)?;

    approx::assert_relative_eq!(result.drift, 5.0, max_relative = 1e-9);
    approx::assert_relative_eq!(result.rns, FRAC_PI_4 * 1e4, max_relative = 1e-9);
    approx::assert_abs_diff_eq!(result.rns_error, 0.0, epsilon = 1e-6);
    for s in &samples {
        assert_eq!(s.flag, Some(Tolerance::Within));
    }

    Ok(())
}

#[test]
fn rows_deviating_beyond_the_allowance_are_flagged() -> Result<()> {
    // Collinear except the third row, whose resistance is 20% high. The
    // perturbation drags the fitted drift, so the two short-diameter rows
    // deviate by 13.8% and 15.5% while the rest stay below 7%.
    let mut samples = grid(&[
        (15.0, 100.0),
        (25.0, 25.0),
        (35.0, 40.0 / 3.0),
        (55.0, 4.0),
        (75.0, 10_000.0 / 4900.0),
        (105.0, 1.0),
    ]);
    let config = Config {
        allowed_error_percent: 10.0,
        ..Config::default()
    };

    run(&mut samples, &config)?;

    let flags: Vec<_> = samples.iter().map(|s| s.flag.unwrap()).collect();
    assert_eq!(
        flags,
        vec![
            Tolerance::Exceeded,
            Tolerance::Within,
            Tolerance::Exceeded,
            Tolerance::Within,
            Tolerance::Within,
            Tolerance::Within,
        ]
    );

    Ok(())
}

#[test]
fn fewer_than_two_valid_rows_is_insufficient_data() {
    let mut samples = grid(&[(10.0, 400.0)]);
    let mut incomplete = Sample::new(2, "no-resistance");
    incomplete.diameter = Some(20.0);
    samples.push(incomplete);
    let config = Config::default();

    match run(&mut samples, &config) {
        Err(Error::InsufficientData { found: 1 }) => {}
        other => panic!("expected insufficient data, got {other:?}"),
    }
}

#[test]
fn repeated_runs_are_bit_identical() -> Result<()> {
    let mut first = reference_grid();
    let config = Config::default();

    let first_result = run(&mut first, &config)?;
    let mut second = first.clone();
    let second_result = run(&mut second, &config)?;

    assert_eq!(first_result, second_result);
    assert_eq!(first, second);

    Ok(())
}

#[test]
fn per_sample_drift_mode_tracks_a_drift_per_row() -> Result<()> {
    let mut samples = collinear_grid();
    let config = Config {
        drift_error: DriftErrorMode::PerSample,
        ..Config::default()
    };

    let result = run(&mut samples, &config)?;

    // On exactly collinear data every per-sample drift equals the global one.
    for s in &samples {
        approx::assert_relative_eq!(s.drift.unwrap(), 5.0, max_relative = 1e-9);
    }
    approx::assert_abs_diff_eq!(result.drift_error, 0.0, epsilon = 1e-6);

    // The default mode keeps a single global drift and a zero spread.
    let mut samples = collinear_grid();
    let result = run(&mut samples, &Config::default())?;
    assert!(samples.iter().all(|s| s.drift.is_none()));
    approx::assert_relative_eq!(result.drift_error, 0.0);

    Ok(())
}

#[test]
fn nominal_areas_are_corrected_for_the_fitted_drift() -> Result<()> {
    let mut samples = collinear_grid();
    let config = Config {
        planned_drift: 1.0,
        nominal_areas: vec![100.0, 400.0],
        ..Config::default()
    };

    let result = run(&mut samples, &config)?;

    assert_eq!(result.real_areas.len(), 2);
    for (&nominal, &real) in config.nominal_areas.iter().zip(&result.real_areas) {
        let expected = FRAC_PI_4
            * ((4.0 * nominal / std::f64::consts::PI).sqrt() + config.planned_drift - result.drift)
                .powi(2);
        approx::assert_relative_eq!(real, expected, max_relative = 1e-12);
    }

    Ok(())
}

#[test]
fn a_session_round_trips_through_csv_config_and_the_cell_bank() -> Result<()> {
    let tmp_dir = TempDir::new("rns-session").unwrap();

    let csv_path = tmp_dir.path().join("samples.csv");
    std::fs::write(
        &csv_path,
        "number,name,selected,diameter,resistance\n\
         1,a,true,10,400\n\
         2,b,true,20,225\n\
         3,c,true,30,100\n\
         4,d,true,40,25\n\
         5,e,false,50,11\n\
         6,f,true,60,\n",
    )?;
    let config_path = tmp_dir.path().join("config.toml");
    std::fs::write(&config_path, "allowed_error_percent = 50.0\n")?;

    let mut samples: Vec<Sample<f64>> = sample::from_file(&csv_path)?;
    assert_eq!(samples.len(), 6);
    assert!(!samples[4].selected);
    assert!(samples[5].resistance.is_none());

    let config: Config<f64> = Config::from_file(&config_path)?;
    assert_eq!(config.allowed_error_percent, 50.0);

    let result = run(&mut samples, &config)?;
    approx::assert_relative_eq!(result.slope, 29.0 / 6000.0, max_relative = 1e-12);

    // Archive the run and read it back.
    let mut bank = CellBank::new();
    bank.update_or_create(Cell::from_run(1, "wafer-a", &samples, result.clone())?)?;

    let archived = bank.get_by_name("wafer-a").unwrap();
    assert_eq!(archived.diameter_list, vec![10.0, 20.0, 30.0, 40.0]);
    assert_eq!(archived.result, result);
    // Tolerance flags are recoloring state, not archived data.
    let restored = samples_from_snapshot::<f64>(&archived.initial_data)?;
    let mut expected = samples.clone();
    for s in &mut expected {
        s.flag = None;
    }
    assert_eq!(restored, expected);

    // The plot series comes from the same filtered columns, with the fit
    // line reaching down to the drift x-intercept.
    let diameters: Vec<_> = samples.iter().map(|s| s.diameter).collect();
    let rn_sqrts: Vec<_> = samples.iter().map(|s| s.rn_sqrt).collect();
    let (xs, ys) = drop_missing_pairs(&diameters, &rn_sqrts)?;
    let plot = scatter_with_fit(&xs, &ys, &result.line(), result.drift)?;
    assert_eq!(plot.points.len(), 4);
    approx::assert_relative_eq!(plot.fit[0].0, result.drift);
    approx::assert_abs_diff_eq!(plot.fit[0].1, 0.0, epsilon = 1e-12);

    Ok(())
}

#[test]
fn a_rewritten_cell_replaces_the_previous_run() -> Result<()> {
    let config = Config::default();
    let mut bank = CellBank::new();

    let mut samples = reference_grid();
    let result = run(&mut samples, &config)?;
    bank.update_or_create(Cell::from_run(2, "wafer-b", &samples, result)?)?;

    let mut samples = collinear_grid();
    let result = run(&mut samples, &config)?;
    bank.update_or_create(Cell::from_run(2, "wafer-b", &samples, result.clone())?)?;

    assert_eq!(bank.len(), 1);
    let archived = bank.get(2).unwrap();
    assert_eq!(archived.result, result);
    assert_eq!(archived.diameter_list, vec![15.0, 25.0, 55.0, 105.0]);

    Ok(())
}
