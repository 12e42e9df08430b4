use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sqw_core::{derive_substream_seed, SqwError, SqwResult};
use tracing::{debug, info};

use crate::accumulator::CorrelationAccumulator;
use crate::buffer::SampleBuffer;
use crate::config::CorrelationConfig;

fn default_chunk_size() -> usize {
    4
}

/// Parameters of a parallel ensemble run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleOptions {
    /// Number of independent samples to draw.
    pub samples: usize,
    /// Master seed; sample `i` receives `derive_substream_seed(master_seed, i)`.
    pub master_seed: u64,
    /// Samples per worker accumulator. Fixing it fixes the merge tree, which
    /// keeps results independent of the thread count.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl EnsembleOptions {
    /// Options with the default chunk size.
    pub fn new(samples: usize, master_seed: u64) -> Self {
        Self {
            samples,
            master_seed,
            chunk_size: default_chunk_size(),
        }
    }
}

/// Fills independent accumulators in parallel and pools them.
///
/// `sampler(seed, buffer)` must write one independently thermalized trajectory
/// into the zeroed `buffer`. Each chunk of samples goes into its own
/// accumulator on a rayon worker; the partial results are merged in chunk
/// order with count-weighted pooling.
pub fn accumulate_ensemble<F>(
    config: &CorrelationConfig,
    options: &EnsembleOptions,
    sampler: F,
) -> SqwResult<CorrelationAccumulator>
where
    F: Fn(u64, &mut SampleBuffer) -> SqwResult<()> + Sync,
{
    if options.chunk_size == 0 {
        return Err(SqwError::configuration(
            "invalid-chunk-size",
            "ensemble chunk size must be positive",
        ));
    }
    let mut pooled = CorrelationAccumulator::new(config.clone())?;
    let chunks: Vec<(usize, usize)> = (0..options.samples)
        .step_by(options.chunk_size)
        .map(|start| (start, (start + options.chunk_size).min(options.samples)))
        .collect();
    let partials = chunks
        .par_iter()
        .map(|&(start, end)| -> SqwResult<CorrelationAccumulator> {
            let mut accumulator = CorrelationAccumulator::new(config.clone())?;
            for index in start..end {
                let seed = derive_substream_seed(options.master_seed, index as u64);
                let mut buffer = accumulator.new_buffer();
                sampler(seed, &mut buffer)?;
                accumulator.add_sample(&mut buffer)?;
            }
            debug!(start, end, "finished ensemble chunk");
            Ok(accumulator)
        })
        .collect::<SqwResult<Vec<_>>>()?;
    for partial in &partials {
        pooled.merge(partial)?;
    }
    info!(
        samples = pooled.nsamples(),
        chunks = partials.len(),
        "ensemble accumulation complete"
    );
    Ok(pooled)
}
