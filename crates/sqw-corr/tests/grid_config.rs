use std::f64::consts::PI;

use sqw_core::SqwError;
use sqw_corr::{CorrelationAccumulator, CorrelationConfig, Grid};

#[test]
fn measperiod_and_energy_spacing() {
    let config = CorrelationConfig::dynamical([4, 4, 1], 0.05, 10, 5.0);
    let grid = Grid::from_config(&config).unwrap();
    assert_eq!(grid.n_time, 19);
    assert_eq!(grid.measperiod, 12);
    let expected = 2.0 * PI / (0.05 * 12.0 * 19.0);
    assert!((grid.delta_omega - expected).abs() < 1e-14);

    let positive = grid.available_energies(false);
    assert_eq!(positive.len(), 10);
    assert_eq!(positive[0], 0.0);
    assert!(positive.windows(2).all(|w| w[1] > w[0]));

    let signed = grid.available_energies(true);
    assert_eq!(signed.len(), 19);
    for n in 1..19 {
        let partner = grid.negated_energy_index(n);
        assert!((signed[n] + signed[partner]).abs() < 1e-12);
    }
    assert!(signed[10] < 0.0);
}

#[test]
fn nyquist_limit_is_enforced_at_construction() {
    let config = CorrelationConfig::dynamical([2, 2, 2], 0.1, 5, 40.0);
    let err = CorrelationAccumulator::new(config).unwrap_err();
    assert!(matches!(err, SqwError::Configuration(_)));
    assert_eq!(err.info().code, "omega-max-too-large");

    let exact = CorrelationConfig::dynamical([2, 2, 2], 0.1, 5, PI / 0.1);
    let grid = Grid::from_config(&exact).unwrap();
    assert_eq!(grid.measperiod, 1);
}

#[test]
fn invalid_parameters_are_rejected() {
    let mut config = CorrelationConfig::dynamical([2, 2, 2], -0.1, 5, 1.0);
    assert_eq!(Grid::from_config(&config).unwrap_err().info().code, "invalid-dt");

    config.dt = 0.1;
    config.nomega = 0;
    assert_eq!(Grid::from_config(&config).unwrap_err().info().code, "invalid-nomega");

    config.nomega = 4;
    config.omega_max = Some(0.0);
    assert_eq!(Grid::from_config(&config).unwrap_err().info().code, "invalid-omega-max");

    config.omega_max = Some(1.0);
    config.pairs = Some(vec![(0, 5)]);
    assert_eq!(Grid::from_config(&config).unwrap_err().info().code, "pair-out-of-range");

    config.pairs = None;
    config.lattice_size = [2, 0, 2];
    assert_eq!(Grid::from_config(&config).unwrap_err().info().code, "lattice-size");
}

#[test]
fn static_grid_has_single_energy() {
    let grid = Grid::from_config(&CorrelationConfig::instant([3, 3, 1])).unwrap();
    assert!(grid.is_static());
    assert_eq!(grid.n_time, 1);
    assert_eq!(grid.available_energies(true), vec![0.0]);
    assert_eq!(grid.energy_index(12.0).unwrap(), 0);
}

#[test]
fn energy_lookup_snaps_and_bounds() {
    let grid = Grid::from_config(&CorrelationConfig::dynamical([2, 1, 1], 0.1, 4, 2.0)).unwrap();
    let dw = grid.delta_omega;
    assert_eq!(grid.energy_index(2.0 * dw + 0.1 * dw).unwrap(), 2);
    assert_eq!(grid.energy_index(-dw).unwrap(), grid.n_time - 1);
    let err = grid.energy_index(10.0 * dw).unwrap_err();
    assert_eq!(err.info().code, "energy-out-of-range");
}

#[test]
fn default_pairs_cover_upper_triangle() {
    let config = CorrelationConfig::dynamical([2, 2, 2], 0.1, 2, 1.0);
    let pairs = config.resolved_pairs();
    assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
}

#[test]
fn yaml_configuration_loads_with_defaults() {
    let yaml = r#"
lattice_size: [4, 4, 1]
dt: 0.05
nomega: 10
omega_max: 5.0
track_variance: true
geometry:
  positions:
    - [0.0, 0.0, 0.0]
    - [0.5, 0.5, 0.0]
pairs:
  - [0, 0]
  - [2, 2]
preprocess:
  subtract_mean: true
"#;
    let config = CorrelationConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.channels.len(), 3);
    assert_eq!(config.geometry.natoms(), 2);
    assert_eq!(config.geometry.vectors[1], [0.0, 1.0, 0.0]);
    assert!(config.preprocess.subtract_mean);
    assert!(!config.preprocess.symmetrize_time);
    assert_eq!(config.resolved_pairs(), vec![(0, 0), (2, 2)]);

    let text = config.to_yaml_string().unwrap();
    let reparsed = CorrelationConfig::from_yaml_str(&text).unwrap();
    assert_eq!(config, reparsed);

    let accumulator = CorrelationAccumulator::new(config).unwrap();
    assert!(accumulator.tracks_variance());
    assert_eq!(accumulator.grid().buffer_shape().natoms, 2);
}

#[test]
fn yaml_validation_errors_surface() {
    let yaml = "lattice_size: [2, 2, 2]\ndt: 0.1\nchannels: [Sx, Sx]\n";
    let err = CorrelationConfig::from_yaml_str(yaml).unwrap_err();
    assert_eq!(err.info().code, "duplicate-channel");
    let err = CorrelationConfig::from_yaml_str("lattice_size: [2, 2]\n").unwrap_err();
    assert!(matches!(err, SqwError::Serde(_)));
}
