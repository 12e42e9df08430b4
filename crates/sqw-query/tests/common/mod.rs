#![allow(dead_code)]

use rand::Rng;
use sqw_core::RngHandle;
use sqw_corr::{Complex64, CorrelationAccumulator, CorrelationConfig, LatticeGeometry, SampleBuffer};
use sqw_query::{Contraction, CorrelationSlice, QueryPoint};

/// 2×2×1 lattice, one sublattice, one channel, four non-negative energies.
pub fn scalar_config() -> CorrelationConfig {
    let mut config = CorrelationConfig::dynamical([2, 2, 1], 0.1, 4, 2.0);
    config.channels = vec!["Sz".to_string()];
    config
}

/// Two channels and two sublattices at generic positions on a 3×2×2 lattice.
pub fn two_site_config() -> CorrelationConfig {
    let mut config = CorrelationConfig::dynamical([3, 2, 2], 0.1, 3, 4.0);
    config.channels = vec!["A".to_string(), "B".to_string()];
    config.geometry = LatticeGeometry::cubic(vec![[0.0, 0.0, 0.0], [0.3, 0.1, 0.25]]);
    config
}

pub fn random_buffer(accumulator: &CorrelationAccumulator, seed: u64) -> SampleBuffer {
    let mut rng = RngHandle::from_seed(seed);
    let mut buffer = accumulator.new_buffer();
    let shape = buffer.shape();
    let [l1, l2, l3] = shape.lattice_size;
    for c in 0..shape.nchannels {
        for x in 0..l1 {
            for y in 0..l2 {
                for z in 0..l3 {
                    for a in 0..shape.natoms {
                        for t in 0..shape.n_time {
                            buffer.set(c, [x, y, z], a, t, rng.gen_range(-1.0..1.0));
                        }
                    }
                }
            }
        }
    }
    buffer
}

pub fn filled(config: CorrelationConfig, samples: u64) -> CorrelationAccumulator {
    let mut accumulator = CorrelationAccumulator::new(config).unwrap();
    for seed in 0..samples {
        let mut buffer = random_buffer(&accumulator, seed);
        accumulator.add_sample(&mut buffer).unwrap();
    }
    accumulator
}

/// Raw sublattice-summed correlation of one ordered channel pair.
pub fn pair_value(a: usize, b: usize) -> Contraction<Complex64> {
    Contraction::custom(vec![(a, b)], move |_: &QueryPoint, slice: &CorrelationSlice| {
        slice.value(a, b)
    })
}

pub fn assert_close(actual: Complex64, expected: Complex64, tolerance: f64) {
    let scale = expected.norm().max(1.0);
    assert!(
        (actual - expected).norm() <= tolerance * scale,
        "{actual} vs {expected}"
    );
}
