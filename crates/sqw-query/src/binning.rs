//! Aggregation of exact-grid intensities into rectangular `(q, ω)` bins.

use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};
use tracing::debug;

use crate::engine::Intensities;
use crate::formula::IntensityValue;
use crate::wavevector::{InterpolationMode, Wavevector};

fn bin_error(message: &str, edges: &[f64]) -> SqwError {
    SqwError::Configuration(
        ErrorInfo::new("bin-edges", message).with_context("edges", format!("{edges:?}")),
    )
}

/// Bins along one axis.
///
/// Bin `i` covers `[edges[i], edges[i + 1])`; the last bin also includes its
/// right edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisBins {
    edges: Vec<f64>,
}

impl AxisBins {
    /// Bins from explicit, strictly increasing, finite edges.
    pub fn from_edges(edges: Vec<f64>) -> SqwResult<Self> {
        if edges.len() < 2 {
            return Err(bin_error("at least two bin edges are required", &edges));
        }
        if edges.iter().any(|edge| !edge.is_finite()) {
            return Err(bin_error("bin edges must be finite", &edges));
        }
        if edges.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(bin_error("bin edges must be strictly increasing", &edges));
        }
        Ok(Self { edges })
    }

    /// Bins centered on `centers`, with edges at the midpoints and the outer
    /// edges half a spacing beyond the first and last center.
    pub fn from_centers(centers: &[f64]) -> SqwResult<Self> {
        if centers.len() < 2 {
            return Err(bin_error("at least two bin centers are required", centers));
        }
        let n = centers.len();
        let mut edges = Vec::with_capacity(n + 1);
        edges.push(centers[0] - 0.5 * (centers[1] - centers[0]));
        edges.extend(centers.windows(2).map(|pair| 0.5 * (pair[0] + pair[1])));
        edges.push(centers[n - 1] + 0.5 * (centers[n - 1] - centers[n - 2]));
        Self::from_edges(edges)
    }

    /// Bins of `width` starting at `start`; the last bin is the first whose
    /// right edge reaches `end`.
    pub fn uniform(start: f64, end: f64, width: f64) -> SqwResult<Self> {
        if !(width.is_finite() && width > 0.0 && end > start) {
            return Err(bin_error("uniform bins need width > 0 and end > start", &[start, end]));
        }
        let count = (((end - start) / width) - 1e-9).ceil().max(1.0) as usize;
        Self::from_edges((0..=count).map(|i| start + i as f64 * width).collect())
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin midpoints.
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|pair| 0.5 * (pair[0] + pair[1])).collect()
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    /// Always false; an axis has at least one bin.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lower and upper edge of the whole axis.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Bin containing `x`.
    pub fn locate(&self, x: f64) -> Option<usize> {
        let (lo, hi) = self.range();
        if !(lo..=hi).contains(&x) {
            return None;
        }
        if x == hi {
            return Some(self.len() - 1);
        }
        Some(self.edges.partition_point(|&edge| edge <= x) - 1)
    }
}

/// Bins along the three reciprocal-lattice axes and energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningParameters {
    /// `[q1, q2, q3, ω]` axes; momenta in reciprocal lattice units.
    pub axes: [AxisBins; 4],
}

impl BinningParameters {
    /// Groups the four axes.
    pub fn new(q1: AxisBins, q2: AxisBins, q3: AxisBins, energy: AxisBins) -> Self {
        Self {
            axes: [q1, q2, q3, energy],
        }
    }

    /// Bin counts per axis.
    pub fn shape(&self) -> [usize; 4] {
        [
            self.axes[0].len(),
            self.axes[1].len(),
            self.axes[2].len(),
            self.axes[3].len(),
        ]
    }

    /// Flat index of a 4-D bin, energy fastest.
    pub fn index(&self, bin: [usize; 4]) -> usize {
        let shape = self.shape();
        ((bin[0] * shape[1] + bin[1]) * shape[2] + bin[2]) * shape[3] + bin[3]
    }
}

/// Summed intensities and hit counts per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedIntensities<T> {
    /// Bin layout.
    pub parameters: BinningParameters,
    /// Sum of the grid intensities falling in each bin; `None` for empty bins.
    pub signal: Vec<Option<T>>,
    /// Number of grid points falling in each bin.
    pub counts: Vec<u64>,
}

impl<T: IntensityValue> BinnedIntensities<T> {
    /// Number of grid points in `bin`.
    pub fn count(&self, bin: [usize; 4]) -> u64 {
        self.counts[self.parameters.index(bin)]
    }

    /// Bin-averaged intensity; `None` when no grid point falls in `bin`.
    pub fn mean(&self, bin: [usize; 4]) -> Option<T> {
        let index = self.parameters.index(bin);
        self.signal[index].as_ref().map(|sum| {
            let mut mean = sum.clone();
            mean.scale(1.0 / self.counts[index] as f64);
            mean
        })
    }
}

impl<'a, T: IntensityValue> Intensities<'a, T> {
    /// Aggregates intensities at every exact grid point (over all zones the
    /// momentum bins overlap) and every signed grid energy into `parameters`.
    pub fn binned(&self, parameters: &BinningParameters) -> SqwResult<BinnedIntensities<T>> {
        let grid = self.accumulator().grid();
        let total: usize = parameters.shape().iter().product();
        let mut signal: Vec<Option<T>> = vec![None; total];
        let mut counts = vec![0u64; total];

        let mut ranges = Vec::with_capacity(3);
        for axis in 0..3 {
            let (lo, hi) = parameters.axes[axis].range();
            let l = grid.lattice_size[axis] as f64;
            ranges.push(((lo * l).floor() as i64, (hi * l).ceil() as i64));
        }
        let energy_bins: Vec<(usize, Option<usize>)> = (0..grid.n_time)
            .map(|w| (w, parameters.axes[3].locate(grid.energy(w))))
            .collect();

        let mut points = 0usize;
        for m1 in ranges[0].0..=ranges[0].1 {
            let q1 = m1 as f64 / grid.lattice_size[0] as f64;
            let Some(b1) = parameters.axes[0].locate(q1) else {
                continue;
            };
            for m2 in ranges[1].0..=ranges[1].1 {
                let q2 = m2 as f64 / grid.lattice_size[1] as f64;
                let Some(b2) = parameters.axes[1].locate(q2) else {
                    continue;
                };
                for m3 in ranges[2].0..=ranges[2].1 {
                    let q3 = m3 as f64 / grid.lattice_size[2] as f64;
                    let Some(b3) = parameters.axes[2].locate(q3) else {
                        continue;
                    };
                    let q = Wavevector::Lattice([q1, q2, q3]);
                    let query = self.prepare(&q, InterpolationMode::Nearest)?;
                    points += 1;
                    for &(w, energy_bin) in &energy_bins {
                        let Some(b4) = energy_bin else {
                            continue;
                        };
                        let index = parameters.index([b1, b2, b3, b4]);
                        let value = self.evaluate(&query, w);
                        if let Some(sum) = signal[index].as_mut() {
                            sum.add_scaled(&value, 1.0);
                        } else {
                            signal[index] = Some(value);
                        }
                        counts[index] += 1;
                    }
                }
            }
        }
        debug!(points, bins = total, "binned grid intensities");
        Ok(BinnedIntensities {
            parameters: parameters.clone(),
            signal,
            counts,
        })
    }
}
