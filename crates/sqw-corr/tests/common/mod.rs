#![allow(dead_code)]

use rand::Rng;
use sqw_core::RngHandle;
use sqw_corr::{Complex64, CorrelationAccumulator, CorrelationConfig, SampleBuffer};

/// 2×2×1 lattice, one sublattice, one channel, four non-negative energies.
pub fn scalar_config(track_variance: bool) -> CorrelationConfig {
    let mut config = CorrelationConfig::dynamical([2, 2, 1], 0.1, 4, 2.0);
    config.channels = vec!["Sz".to_string()];
    config.track_variance = track_variance;
    config
}

/// Two channels with both orders stored explicitly on a 3×2×1 lattice.
pub fn pair_config() -> CorrelationConfig {
    let mut config = CorrelationConfig::dynamical([3, 2, 1], 0.1, 3, 4.0);
    config.channels = vec!["A".to_string(), "B".to_string()];
    config.pairs = Some(vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
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

/// Per-entry products `F_α · conj(F_β)` of one raw sample, in mean-tensor order.
pub fn sample_products(accumulator: &CorrelationAccumulator, raw: &SampleBuffer) -> Vec<Complex64> {
    let mut transformed = raw.clone();
    accumulator.transform(&mut transformed).unwrap();
    let natoms = accumulator.grid().natoms;
    let mut products = Vec::new();
    for &(alpha, beta) in accumulator.pairs() {
        for j in 0..natoms {
            for k in 0..natoms {
                let fa = transformed.block(alpha, j);
                let fb = transformed.block(beta, k);
                products.extend(fa.iter().zip(fb.iter()).map(|(a, b)| *a * b.conj()));
            }
        }
    }
    products
}

pub fn assert_close(actual: Complex64, expected: Complex64, tolerance: f64) {
    let scale = expected.norm().max(1.0);
    assert!(
        (actual - expected).norm() <= tolerance * scale,
        "{actual} vs {expected}"
    );
}
