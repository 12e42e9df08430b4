mod common;

use common::{random_buffer, scalar_config};
use sqw_core::SqwError;
use sqw_corr::{AccumulatorCheckpoint, CorrelationAccumulator};
use tempfile::tempdir;

fn filled(track_variance: bool) -> CorrelationAccumulator {
    let mut accumulator = CorrelationAccumulator::new(scalar_config(track_variance)).unwrap();
    for seed in 0..5 {
        let mut buffer = random_buffer(&accumulator, seed);
        accumulator.add_sample(&mut buffer).unwrap();
    }
    accumulator
}

#[test]
fn json_roundtrip_restores_tensors() {
    let accumulator = filled(true);
    let json = accumulator.checkpoint().unwrap().to_json().unwrap();
    let restored = AccumulatorCheckpoint::from_json(&json)
        .unwrap()
        .restore()
        .unwrap();
    assert_eq!(restored.nsamples(), 5);
    assert_eq!(restored.mean_tensor(), accumulator.mean_tensor());
    assert_eq!(
        restored.second_moment_tensor(),
        accumulator.second_moment_tensor()
    );
    assert_eq!(restored.config(), accumulator.config());
}

#[test]
fn binary_file_roundtrip_allows_resuming() {
    let mut accumulator = filled(false);
    let dir = tempdir().unwrap();
    let path = dir.path().join("campaign").join("sqw.ckpt");
    accumulator.checkpoint().unwrap().store(&path).unwrap();

    let mut resumed = AccumulatorCheckpoint::load(&path).unwrap().restore().unwrap();
    let raw = random_buffer(&accumulator, 99);
    accumulator.add_sample(&mut raw.clone()).unwrap();
    resumed.add_sample(&mut raw.clone()).unwrap();
    assert_eq!(resumed.nsamples(), 6);
    assert_eq!(resumed.mean_tensor(), accumulator.mean_tensor());
}

#[test]
fn tampered_payload_fails_hash_check() {
    let mut checkpoint = filled(true).checkpoint().unwrap();
    checkpoint.nsamples += 1;
    let err = checkpoint.restore().unwrap_err();
    assert!(matches!(err, SqwError::Serde(_)));
    assert_eq!(err.info().code, "checkpoint-hash");
}

#[test]
fn newer_schema_is_rejected() {
    let mut checkpoint = filled(false).checkpoint().unwrap();
    checkpoint.schema_version.major = 2;
    let err = checkpoint.restore().unwrap_err();
    assert_eq!(err.info().code, "checkpoint-schema");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.ckpt");
    let err = AccumulatorCheckpoint::load(&path).unwrap_err();
    assert_eq!(err.info().code, "checkpoint-read");
    assert!(err.info().context.contains_key("path"));
}
