mod common;

use common::{assert_close, random_buffer, scalar_config};
use rand::Rng;
use sqw_core::derive_substream_seed;
use sqw_corr::{accumulate_ensemble, CorrelationAccumulator, EnsembleOptions, SampleBuffer};

fn fill(accumulator: &mut CorrelationAccumulator, seeds: std::ops::Range<u64>) {
    for seed in seeds {
        let mut buffer = random_buffer(accumulator, seed);
        accumulator.add_sample(&mut buffer).unwrap();
    }
}

#[test]
fn merged_halves_match_single_run() {
    let config = scalar_config(true);
    let mut single = CorrelationAccumulator::new(config.clone()).unwrap();
    fill(&mut single, 0..10);

    let mut left = CorrelationAccumulator::new(config.clone()).unwrap();
    let mut right = CorrelationAccumulator::new(config).unwrap();
    fill(&mut left, 0..4);
    fill(&mut right, 4..10);
    left.merge(&right).unwrap();

    assert_eq!(left.nsamples(), 10);
    for (a, b) in left.mean_tensor().iter().zip(single.mean_tensor()) {
        assert_close(*a, *b, 1e-12);
    }
    let pooled = left.variance_tensor().unwrap();
    let direct = single.variance_tensor().unwrap();
    for (a, b) in pooled.iter().zip(direct.iter()) {
        assert!((a - b).abs() <= 1e-10 * b.max(1.0));
    }
}

#[test]
fn merging_into_empty_copies_state() {
    let config = scalar_config(true);
    let mut filled = CorrelationAccumulator::new(config.clone()).unwrap();
    fill(&mut filled, 0..3);
    let mut empty = CorrelationAccumulator::new(config).unwrap();
    empty.merge(&filled).unwrap();
    assert_eq!(empty.nsamples(), 3);
    assert_eq!(empty.mean_tensor(), filled.mean_tensor());
    assert_eq!(empty.second_moment_tensor(), filled.second_moment_tensor());
}

#[test]
fn merge_rejects_different_configuration() {
    let mut a = CorrelationAccumulator::new(scalar_config(true)).unwrap();
    let b = CorrelationAccumulator::new(scalar_config(false)).unwrap();
    let err = a.merge(&b).unwrap_err();
    assert_eq!(err.info().code, "merge-config");
}

fn write_seeded(seed: u64, buffer: &mut SampleBuffer) {
    let mut rng = sqw_core::RngHandle::from_seed(seed);
    let shape = buffer.shape();
    let [l1, l2, l3] = shape.lattice_size;
    for x in 0..l1 {
        for y in 0..l2 {
            for z in 0..l3 {
                for t in 0..shape.n_time {
                    buffer.set(0, [x, y, z], 0, t, rng.gen_range(-1.0..1.0));
                }
            }
        }
    }
}

#[test]
fn ensemble_matches_sequential_sampling() {
    let config = scalar_config(true);
    let options = EnsembleOptions {
        samples: 11,
        master_seed: 2024,
        chunk_size: 3,
    };
    let pooled = accumulate_ensemble(&config, &options, |seed, buffer| {
        write_seeded(seed, buffer);
        Ok(())
    })
    .unwrap();

    let mut sequential = CorrelationAccumulator::new(config).unwrap();
    for index in 0..options.samples as u64 {
        let mut buffer = sequential.new_buffer();
        write_seeded(derive_substream_seed(options.master_seed, index), &mut buffer);
        sequential.add_sample(&mut buffer).unwrap();
    }
    assert_eq!(pooled.nsamples(), 11);
    for (a, b) in pooled.mean_tensor().iter().zip(sequential.mean_tensor()) {
        assert_close(*a, *b, 1e-12);
    }
    let pooled_var = pooled.variance_tensor().unwrap();
    let seq_var = sequential.variance_tensor().unwrap();
    for (a, b) in pooled_var.iter().zip(seq_var.iter()) {
        assert!((a - b).abs() <= 1e-10 * b.max(1.0));
    }
}

#[test]
fn ensemble_propagates_sampler_errors() {
    let options = EnsembleOptions::new(4, 1);
    let err = accumulate_ensemble(&scalar_config(false), &options, |_, _| {
        Err(sqw_core::SqwError::configuration("sampler", "thermalization failed"))
    })
    .unwrap_err();
    assert_eq!(err.info().code, "sampler");
    let zero_chunk = EnsembleOptions {
        chunk_size: 0,
        ..EnsembleOptions::new(4, 1)
    };
    assert!(accumulate_ensemble(&scalar_config(false), &zero_chunk, |_, _| Ok(())).is_err());
}
