use num_complex::Complex64;
use sqw_core::{ErrorInfo, SqwError, SqwResult};
use tracing::{debug, trace, warn};

use crate::buffer::SampleBuffer;
use crate::config::{ChannelPair, CorrelationConfig};
use crate::grid::Grid;
use crate::transform::FourierPlan;

/// Resolved reference to a stored channel pair.
///
/// `conjugate` is set when the requested order `(β, α)` is served from the
/// stored `(α, β)` through `S_βα = conj(S_αβ)`; the sublattice indices are
/// swapped accordingly by [`CorrelationAccumulator::mean_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairRef {
    /// Position of the stored pair in [`CorrelationAccumulator::pairs`].
    pub index: usize,
    /// Whether the stored entry must be conjugated.
    pub conjugate: bool,
}

/// Running `(q, ω)` correlation statistics.
///
/// Layout of the mean (and second-moment) tensor is
/// `[pair][sublattice j][sublattice k][x][y][z][ω]`, time fastest.
/// The second-moment tensor holds `Σ |X − μ|²` and exists iff variance
/// tracking was requested.
#[derive(Debug, Clone)]
pub struct CorrelationAccumulator {
    config: CorrelationConfig,
    grid: Grid,
    pairs: Vec<ChannelPair>,
    plan: FourierPlan,
    data: Vec<Complex64>,
    second_moment: Option<Vec<f64>>,
    nsamples: u64,
}

impl CorrelationAccumulator {
    /// Creates an empty accumulator. All configuration errors surface here.
    pub fn new(config: CorrelationConfig) -> SqwResult<Self> {
        let grid = Grid::from_config(&config)?;
        let pairs = config.resolved_pairs();
        let len = pairs.len() * grid.natoms * grid.natoms * grid.block_len();
        let plan = FourierPlan::new(grid.buffer_shape());
        debug!(
            lattice = ?grid.lattice_size,
            natoms = grid.natoms,
            pairs = pairs.len(),
            n_time = grid.n_time,
            measperiod = grid.measperiod,
            delta_omega = grid.delta_omega,
            track_variance = config.track_variance,
            "created correlation accumulator"
        );
        let second_moment = config.track_variance.then(|| vec![0.0; len]);
        Ok(Self {
            config,
            grid,
            pairs,
            plan,
            data: vec![Complex64::new(0.0, 0.0); len],
            second_moment,
            nsamples: 0,
        })
    }

    pub(crate) fn from_parts(
        config: CorrelationConfig,
        nsamples: u64,
        data: Vec<Complex64>,
        second_moment: Option<Vec<f64>>,
    ) -> SqwResult<Self> {
        let mut accumulator = Self::new(config)?;
        if data.len() != accumulator.data.len() {
            return Err(SqwError::ShapeMismatch(
                ErrorInfo::new("tensor-length", "stored mean tensor does not match the grid")
                    .with_context("expected", accumulator.data.len().to_string())
                    .with_context("actual", data.len().to_string()),
            ));
        }
        match (&accumulator.second_moment, &second_moment) {
            (Some(expected), Some(stored)) if expected.len() != stored.len() => {
                return Err(SqwError::ShapeMismatch(
                    ErrorInfo::new(
                        "tensor-length",
                        "stored second-moment tensor does not match the grid",
                    )
                    .with_context("expected", expected.len().to_string())
                    .with_context("actual", stored.len().to_string()),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(SqwError::configuration(
                    "variance-presence",
                    "second-moment tensor presence disagrees with track_variance",
                ));
            }
            _ => {}
        }
        accumulator.data = data;
        accumulator.second_moment = second_moment;
        accumulator.nsamples = nsamples;
        Ok(accumulator)
    }

    /// Construction parameters.
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Derived grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Stored channel pairs, in tensor order.
    pub fn pairs(&self) -> &[ChannelPair] {
        &self.pairs
    }

    /// Number of accumulated samples.
    pub fn nsamples(&self) -> u64 {
        self.nsamples
    }

    /// Whether running second moments are tracked.
    pub fn tracks_variance(&self) -> bool {
        self.second_moment.is_some()
    }

    /// Fresh zero buffer with the shape `add_sample` expects.
    pub fn new_buffer(&self) -> SampleBuffer {
        SampleBuffer::zeros(self.grid.buffer_shape())
    }

    /// Resolves `(a, b)` to a stored pair, directly or through Hermitian conjugation.
    pub fn resolve_pair(&self, a: usize, b: usize) -> SqwResult<PairRef> {
        if let Some(index) = self.pairs.iter().position(|&pair| pair == (a, b)) {
            return Ok(PairRef {
                index,
                conjugate: false,
            });
        }
        if let Some(index) = self.pairs.iter().position(|&pair| pair == (b, a)) {
            return Ok(PairRef {
                index,
                conjugate: true,
            });
        }
        Err(SqwError::Lookup(
            ErrorInfo::new(
                "unknown-channel-pair",
                "channel pair was not registered with the accumulator",
            )
            .with_context("pair", format!("({a}, {b})"))
            .with_context("registered", format!("{:?}", self.pairs)),
        ))
    }

    fn offset(&self, pair: usize, j: usize, k: usize, q: [usize; 3], w: usize) -> usize {
        let natoms = self.grid.natoms;
        let block = ((pair * natoms + j) * natoms + k) * self.grid.block_len();
        block + self.grid.cell_index(q) * self.grid.n_time + w
    }

    /// Stored running mean for pair `pair`, sublattices `(j, k)`, momentum index `q`
    /// and energy index `w`.
    pub fn mean(&self, pair: usize, j: usize, k: usize, q: [usize; 3], w: usize) -> Complex64 {
        self.data[self.offset(pair, j, k, q, w)]
    }

    /// Mean through a resolved pair reference, applying Hermitian completion.
    pub fn mean_at(&self, pair: PairRef, j: usize, k: usize, q: [usize; 3], w: usize) -> Complex64 {
        if pair.conjugate {
            self.mean(pair.index, k, j, q, w).conj()
        } else {
            self.mean(pair.index, j, k, q, w)
        }
    }

    /// Whole mean tensor.
    pub fn mean_tensor(&self) -> &[Complex64] {
        &self.data
    }

    /// Raw second-moment tensor (`Σ |X − μ|²`), if tracked.
    pub fn second_moment_tensor(&self) -> Option<&[f64]> {
        self.second_moment.as_deref()
    }

    fn require_variance(&self) -> SqwResult<&[f64]> {
        self.second_moment.as_deref().ok_or_else(|| {
            SqwError::Configuration(
                ErrorInfo::new(
                    "variance-untracked",
                    "accumulator was built without variance tracking",
                )
                .with_hint("set track_variance: true at construction"),
            )
        })
    }

    /// Unbiased variance of one entry; zero until two samples are present.
    pub fn variance(
        &self,
        pair: usize,
        j: usize,
        k: usize,
        q: [usize; 3],
        w: usize,
    ) -> SqwResult<f64> {
        let m2 = self.require_variance()?;
        if self.nsamples < 2 {
            return Ok(0.0);
        }
        Ok(m2[self.offset(pair, j, k, q, w)] / (self.nsamples - 1) as f64)
    }

    /// Unbiased variance of every entry, in mean-tensor order.
    pub fn variance_tensor(&self) -> SqwResult<Vec<f64>> {
        let m2 = self.require_variance()?;
        if self.nsamples < 2 {
            warn!(
                nsamples = self.nsamples,
                "variance requested with fewer than two samples"
            );
            return Ok(vec![0.0; m2.len()]);
        }
        let denom = (self.nsamples - 1) as f64;
        Ok(m2.iter().map(|value| value / denom).collect())
    }

    /// Applies the configured hooks and the transform without accumulating.
    pub fn transform(&self, buffer: &mut SampleBuffer) -> SqwResult<()> {
        buffer.check_shape(&self.grid.buffer_shape())?;
        let preprocess = self.config.preprocess;
        if preprocess.subtract_mean {
            buffer.subtract_mean();
        }
        if preprocess.symmetrize_time {
            buffer.symmetrize_time();
        }
        self.plan.transform(buffer)
    }

    /// Folds one raw sample into the running statistics.
    ///
    /// The buffer is used as workspace and holds its transform afterwards.
    /// For every stored pair `(α, β)` and sublattices `(j, k)` the product
    /// `X = F_αj · conj(F_βk)` updates the mean as `μ += (X − μ) / n` with
    /// `n` the post-increment sample count. With variance tracking the second
    /// moment grows by `Re[(X − μ_old) · conj(X − μ_new)]`.
    pub fn add_sample(&mut self, buffer: &mut SampleBuffer) -> SqwResult<()> {
        self.transform(buffer)?;
        let count = self.nsamples + 1;
        let weight = 1.0 / count as f64;
        let natoms = self.grid.natoms;
        let block_len = self.grid.block_len();
        let Self {
            pairs,
            data,
            second_moment,
            ..
        } = self;
        for (p, &(alpha, beta)) in pairs.iter().enumerate() {
            for j in 0..natoms {
                let fa = buffer.block(alpha, j);
                for k in 0..natoms {
                    let fb = buffer.block(beta, k);
                    let start = ((p * natoms + j) * natoms + k) * block_len;
                    let mean = &mut data[start..start + block_len];
                    match second_moment.as_mut() {
                        Some(m2) => {
                            let m2 = &mut m2[start..start + block_len];
                            for i in 0..block_len {
                                let sample = fa[i] * fb[i].conj();
                                let old = mean[i];
                                let new = old + (sample - old) * weight;
                                mean[i] = new;
                                // The product is real up to rounding; keep the real part only.
                                m2[i] += ((sample - old) * (sample - new).conj()).re;
                            }
                        }
                        None => {
                            for i in 0..block_len {
                                let sample = fa[i] * fb[i].conj();
                                mean[i] += (sample - mean[i]) * weight;
                            }
                        }
                    }
                }
            }
        }
        self.nsamples = count;
        trace!(nsamples = count, "accumulated sample");
        Ok(())
    }

    /// Combines an independently filled accumulator into this one.
    ///
    /// Means are pooled with weights `n_a / n` and `n_b / n`; second moments
    /// combine as `M_a + M_b + |μ_b − μ_a|² · n_a n_b / n`.
    pub fn merge(&mut self, other: &CorrelationAccumulator) -> SqwResult<()> {
        if self.config != other.config {
            return Err(SqwError::Configuration(
                ErrorInfo::new(
                    "merge-config",
                    "only accumulators with identical configuration can be merged",
                )
                .with_context("left_lattice", format!("{:?}", self.config.lattice_size))
                .with_context("right_lattice", format!("{:?}", other.config.lattice_size)),
            ));
        }
        if other.nsamples == 0 {
            return Ok(());
        }
        if self.nsamples == 0 {
            self.data.clone_from(&other.data);
            self.second_moment.clone_from(&other.second_moment);
            self.nsamples = other.nsamples;
            return Ok(());
        }
        let n_a = self.nsamples as f64;
        let n_b = other.nsamples as f64;
        let total = n_a + n_b;
        let weight_b = n_b / total;
        let cross = n_a * n_b / total;
        match (&mut self.second_moment, &other.second_moment) {
            (Some(m2_a), Some(m2_b)) => {
                for i in 0..self.data.len() {
                    let delta = other.data[i] - self.data[i];
                    self.data[i] += delta * weight_b;
                    m2_a[i] += m2_b[i] + delta.norm_sqr() * cross;
                }
            }
            _ => {
                for (mean, other_mean) in self.data.iter_mut().zip(other.data.iter()) {
                    *mean += (*other_mean - *mean) * weight_b;
                }
            }
        }
        self.nsamples += other.nsamples;
        debug!(
            merged = other.nsamples,
            nsamples = self.nsamples,
            "merged accumulators"
        );
        Ok(())
    }
}
