#![deny(missing_docs)]
//! Sampled dynamical correlations on a periodic lattice.
//!
//! A [`CorrelationAccumulator`] owns a fixed momentum/energy [`Grid`] and a set
//! of requested channel pairs. Every call to
//! [`CorrelationAccumulator::add_sample`] Fourier transforms one real-space,
//! real-time [`SampleBuffer`] and folds the resulting pair products into
//! running means (and optionally running second moments). Accumulators are
//! single-writer values; independent accumulators can be filled in parallel
//! and combined with [`CorrelationAccumulator::merge`].

/// Running mean / second-moment tensor and the `add_sample` update.
pub mod accumulator;
/// Sample buffers and the pre-transform hooks.
pub mod buffer;
/// Checkpoint payloads and their JSON / binary encodings.
pub mod checkpoint;
/// Construction-time configuration.
pub mod config;
/// Parallel ensemble sampling over independent accumulators.
pub mod ensemble;
/// Immutable momentum/energy grid derived from a configuration.
pub mod grid;
/// Content hashing for persisted tensors.
pub mod hash;
/// Trajectory generation through caller-supplied dynamics.
pub mod trajectory;
/// Pre-planned spatial and temporal Fourier transform.
pub mod transform;

pub use accumulator::{CorrelationAccumulator, PairRef};
pub use buffer::{BufferShape, SampleBuffer};
pub use checkpoint::AccumulatorCheckpoint;
pub use config::{ChannelPair, CorrelationConfig, LatticeGeometry, Preprocess};
pub use ensemble::{accumulate_ensemble, EnsembleOptions};
pub use grid::Grid;
pub use trajectory::{accumulate_trajectory, new_sample, Integrator, Observables};
pub use transform::FourierPlan;

/// Complex scalar used for every transformed value and correlation entry.
pub use num_complex::Complex64;
