mod common;

use common::{filled, scalar_config};
use sqw_core::SqwError;
use sqw_query::{
    broaden_energy, gaussian, lorentzian, AxisBins, BinningParameters, Contraction, EnergySelection,
    Intensities, IntensityFormula, QueryOptions, Wavevector,
};

fn signed() -> QueryOptions {
    QueryOptions {
        energies: EnergySelection::Signed,
        ..QueryOptions::default()
    }
}

#[test]
fn narrow_lorentzian_is_close_to_identity() {
    let accumulator = filled(scalar_config(), 3);
    let dw = accumulator.grid().delta_omega;
    let formula = IntensityFormula::new(Contraction::trace(&[0]));
    let intensities = Intensities::new(&accumulator, formula).unwrap();
    let table = intensities
        .intensities(
            &[Wavevector::Lattice([0.5, 0.0, 0.0]), Wavevector::Lattice([0.5, 0.5, 0.0])],
            &signed(),
        )
        .unwrap();
    let broadened = table.broaden(lorentzian(1e-6 * dw)).unwrap();
    assert_eq!(broadened.energies, table.energies);
    for (row, original) in broadened.intensities.iter().zip(&table.intensities) {
        for (value, expected) in row.iter().zip(original) {
            assert!((value - expected).abs() < 1e-9 * expected.abs().max(1.0));
        }
    }
}

#[test]
fn broadening_conserves_total_weight() {
    let energies: Vec<f64> = (-5..=5).map(|n| 0.25 * n as f64).collect();
    let values: Vec<f64> = energies.iter().map(|e| 1.0 + e * e).collect();
    let broadened = broaden_energy(&values, &energies, gaussian(0.6)).unwrap();
    let before: f64 = values.iter().sum();
    let after: f64 = broadened.iter().sum();
    assert!((before - after).abs() < 1e-12 * before);
    // Spreading flattens the curvature at the centre.
    assert!(broadened[5] > values[5]);

    let delta: Vec<f64> = energies.iter().map(|&e| if e == 0.0 { 1.0 } else { 0.0 }).collect();
    let spread = broaden_energy(&delta, &energies, lorentzian(0.5)).unwrap();
    assert!((spread[4] - spread[6]).abs() < 1e-15);
    assert!(spread[5] > spread[4] && spread[4] > spread[3]);
}

#[test]
fn broadening_rejects_bad_input() {
    let err = broaden_energy(&[1.0, 2.0], &[0.0], gaussian(1.0)).unwrap_err();
    assert!(matches!(err, SqwError::ShapeMismatch(_)));
    let err = broaden_energy(&[1.0, 2.0], &[0.0, 1.0], |_: f64, _: f64| 0.0).unwrap_err();
    assert_eq!(err.info().code, "degenerate-kernel");
}

#[test]
fn axis_bins_follow_half_open_convention() {
    let bins = AxisBins::from_edges(vec![0.0, 1.0, 2.0]).unwrap();
    assert_eq!(bins.len(), 2);
    assert_eq!(bins.locate(0.0), Some(0));
    assert_eq!(bins.locate(1.0), Some(1));
    assert_eq!(bins.locate(2.0), Some(1));
    assert_eq!(bins.locate(-1e-12), None);
    assert_eq!(bins.locate(2.5), None);
    assert_eq!(bins.centers(), vec![0.5, 1.5]);

    let centered = AxisBins::from_centers(&[0.0, 0.5, 1.0]).unwrap();
    assert_eq!(centered.edges(), &[-0.25, 0.25, 0.75, 1.25]);

    let uniform = AxisBins::uniform(-1.0, 1.0, 0.5).unwrap();
    assert_eq!(uniform.edges(), &[-1.0, -0.5, 0.0, 0.5, 1.0]);
    assert_eq!(AxisBins::uniform(0.0, 1.1, 0.5).unwrap().len(), 3);

    for err in [
        AxisBins::from_edges(vec![0.0]).unwrap_err(),
        AxisBins::from_edges(vec![0.0, 0.0]).unwrap_err(),
        AxisBins::from_edges(vec![0.0, f64::NAN]).unwrap_err(),
        AxisBins::from_centers(&[1.0]).unwrap_err(),
        AxisBins::uniform(0.0, 1.0, 0.0).unwrap_err(),
    ] {
        assert_eq!(err.info().code, "bin-edges");
    }
}

#[test]
fn binning_aggregates_exact_grid_points() {
    let accumulator = filled(scalar_config(), 2);
    let grid = *accumulator.grid();
    let half = (grid.nomega as f64 - 0.5) * grid.delta_omega;
    let formula = IntensityFormula::new(Contraction::trace(&[0]));
    let intensities = Intensities::new(&accumulator, formula).unwrap();
    let params = BinningParameters::new(
        AxisBins::from_centers(&[0.0, 0.5]).unwrap(),
        AxisBins::from_centers(&[0.0, 0.5]).unwrap(),
        AxisBins::from_edges(vec![-0.5, 0.5]).unwrap(),
        AxisBins::from_edges(vec![-half, half]).unwrap(),
    );
    let binned = intensities.binned(&params).unwrap();
    assert_eq!(params.shape(), [2, 2, 1, 1]);
    let instant = intensities
        .instant_intensities(
            &[Wavevector::Lattice([0.0, 0.0, 0.0]), Wavevector::Lattice([0.5, 0.5, 0.0])],
            &QueryOptions::default(),
        )
        .unwrap();
    assert_eq!(binned.count([0, 0, 0, 0]), grid.n_time as u64);
    assert_eq!(binned.count([1, 1, 0, 0]), grid.n_time as u64);
    let mean = binned.mean([0, 0, 0, 0]).unwrap();
    assert!((mean - instant[0]).abs() < 1e-12 * instant[0].abs().max(1.0));
    let mean = binned.mean([1, 1, 0, 0]).unwrap();
    assert!((mean - instant[1]).abs() < 1e-12 * instant[1].abs().max(1.0));
}

#[test]
fn binning_covers_every_zone_inside_the_bins() {
    let accumulator = filled(scalar_config(), 2);
    let grid = *accumulator.grid();
    let formula = IntensityFormula::new(Contraction::trace(&[0]));
    let intensities = Intensities::new(&accumulator, formula).unwrap();
    let params = BinningParameters::new(
        AxisBins::from_edges(vec![0.0, 1.0]).unwrap(),
        AxisBins::from_edges(vec![-0.25, 0.25]).unwrap(),
        AxisBins::from_edges(vec![-0.5, 0.5]).unwrap(),
        AxisBins::from_edges(vec![-0.5 * grid.delta_omega, 0.5 * grid.delta_omega]).unwrap(),
    );
    let binned = intensities.binned(&params).unwrap();
    // q1 = 0, 1/2 and 1 at ω = 0; the last edge is inclusive.
    assert_eq!(binned.count([0, 0, 0, 0]), 3);
    let table = intensities
        .intensities(
            &[Wavevector::Lattice([0.0, 0.0, 0.0]), Wavevector::Lattice([0.5, 0.0, 0.0])],
            &QueryOptions::default(),
        )
        .unwrap();
    let expected = (2.0 * table.intensities[0][0] + table.intensities[1][0]) / 3.0;
    let mean = binned.mean([0, 0, 0, 0]).unwrap();
    assert!((mean - expected).abs() < 1e-12 * expected.abs().max(1.0));

    let empty = BinningParameters::new(
        AxisBins::from_edges(vec![0.1, 0.2]).unwrap(),
        AxisBins::from_edges(vec![-0.25, 0.25]).unwrap(),
        AxisBins::from_edges(vec![-0.5, 0.5]).unwrap(),
        AxisBins::from_edges(vec![-1.0, 1.0]).unwrap(),
    );
    let binned = intensities.binned(&empty).unwrap();
    assert_eq!(binned.count([0, 0, 0, 0]), 0);
    assert!(binned.mean([0, 0, 0, 0]).is_none());
}
