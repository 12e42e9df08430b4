use sqw_core::{ErrorInfo, SqwError, SqwResult};

use crate::accumulator::CorrelationAccumulator;
use crate::buffer::SampleBuffer;

/// Deterministic time integrator advancing a system state by one step `Δt`.
pub trait Integrator<S> {
    /// Advances `state` in place by one time step.
    fn step(&mut self, state: &mut S) -> SqwResult<()>;
}

impl<S, F> Integrator<S> for F
where
    F: FnMut(&mut S) -> SqwResult<()>,
{
    fn step(&mut self, state: &mut S) -> SqwResult<()> {
        self(state)
    }
}

/// Measured observables of a system state.
pub trait Observables<S> {
    /// Number of channels produced per sublattice.
    fn nchannels(&self) -> usize;

    /// Value of `channel` on sublattice `atom` of unit cell `cell`.
    fn observe(&self, state: &S, channel: usize, cell: [usize; 3], atom: usize) -> f64;
}

/// Records one trajectory starting from `state`.
///
/// Snapshot `0` is the input configuration; between consecutive snapshots the
/// integrator runs `measperiod` steps. `state` is advanced in place, so
/// callers that need the starting configuration must keep a copy. The call
/// blocks for the whole trajectory; integrator errors abort it between
/// steps.
pub fn new_sample<S, I, O>(
    accumulator: &CorrelationAccumulator,
    state: &mut S,
    integrator: &mut I,
    observables: &O,
) -> SqwResult<SampleBuffer>
where
    I: Integrator<S> + ?Sized,
    O: Observables<S> + ?Sized,
{
    let grid = accumulator.grid();
    if observables.nchannels() != grid.nchannels {
        return Err(SqwError::ShapeMismatch(
            ErrorInfo::new(
                "observable-channels",
                "observables do not match the configured channels",
            )
            .with_context("expected", grid.nchannels.to_string())
            .with_context("actual", observables.nchannels().to_string()),
        ));
    }
    let mut buffer = accumulator.new_buffer();
    let [l1, l2, l3] = grid.lattice_size;
    for t in 0..grid.n_time {
        if t > 0 {
            for _ in 0..grid.measperiod {
                integrator.step(state)?;
            }
        }
        for channel in 0..grid.nchannels {
            for x in 0..l1 {
                for y in 0..l2 {
                    for z in 0..l3 {
                        for atom in 0..grid.natoms {
                            let value = observables.observe(state, channel, [x, y, z], atom);
                            buffer.set(channel, [x, y, z], atom, t, value);
                        }
                    }
                }
            }
        }
    }
    Ok(buffer)
}

/// Records a trajectory from `state` and folds it into the accumulator.
pub fn accumulate_trajectory<S, I, O>(
    accumulator: &mut CorrelationAccumulator,
    state: &mut S,
    integrator: &mut I,
    observables: &O,
) -> SqwResult<()>
where
    I: Integrator<S> + ?Sized,
    O: Observables<S> + ?Sized,
{
    let mut buffer = new_sample(accumulator, state, integrator, observables)?;
    accumulator.add_sample(&mut buffer)
}
