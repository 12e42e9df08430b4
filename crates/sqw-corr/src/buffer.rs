use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};

/// Dimensions of a sample buffer: `(channel, x, y, z, sublattice, time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferShape {
    /// Number of observable channels.
    pub nchannels: usize,
    /// Linear lattice dimensions.
    pub lattice_size: [usize; 3],
    /// Number of sublattices.
    pub natoms: usize,
    /// Number of time snapshots.
    pub n_time: usize,
}

impl BufferShape {
    /// Number of `(x, y, z, t)` entries belonging to one channel and sublattice.
    pub fn block_len(&self) -> usize {
        self.lattice_size.iter().product::<usize>() * self.n_time
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.nchannels * self.natoms * self.block_len()
    }

    /// Whether the shape holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_vec(&self) -> [usize; 6] {
        let [l1, l2, l3] = self.lattice_size;
        [self.nchannels, l1, l2, l3, self.natoms, self.n_time]
    }
}

/// One trajectory worth of observable values.
///
/// Indexed by `(channel, cell, sublattice, time)`. Storage keeps each
/// `(channel, sublattice)` block of `x, y, z, t` values contiguous with time
/// fastest, which is the layout the transform and the accumulator walk.
/// After [`crate::CorrelationAccumulator::add_sample`] the buffer holds the
/// transformed values rather than the raw observables.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    shape: BufferShape,
    data: Vec<Complex64>,
}

impl SampleBuffer {
    /// Zero-filled buffer of the given shape.
    pub fn zeros(shape: BufferShape) -> Self {
        Self {
            shape,
            data: vec![Complex64::new(0.0, 0.0); shape.len()],
        }
    }

    /// Builds a buffer from real values laid out in `(channel, x, y, z, sublattice, time)`
    /// row-major order.
    pub fn from_real(shape: BufferShape, values: &[f64]) -> SqwResult<Self> {
        if values.len() != shape.len() {
            return Err(SqwError::ShapeMismatch(
                ErrorInfo::new("buffer-length", "value count does not match the buffer shape")
                    .with_context("expected", shape.len().to_string())
                    .with_context("actual", values.len().to_string()),
            ));
        }
        let mut buffer = Self::zeros(shape);
        let [l1, l2, l3] = shape.lattice_size;
        let mut src = values.iter();
        for c in 0..shape.nchannels {
            for x in 0..l1 {
                for y in 0..l2 {
                    for z in 0..l3 {
                        for a in 0..shape.natoms {
                            for t in 0..shape.n_time {
                                if let Some(&value) = src.next() {
                                    buffer.set(c, [x, y, z], a, t, value);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(buffer)
    }

    /// Shape of the buffer.
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    fn offset(&self, channel: usize, cell: [usize; 3], atom: usize, t: usize) -> usize {
        let [_, l2, l3] = self.shape.lattice_size;
        let block = (channel * self.shape.natoms + atom) * self.shape.block_len();
        let site = (cell[0] * l2 + cell[1]) * l3 + cell[2];
        block + site * self.shape.n_time + t
    }

    /// Real part of the stored value.
    pub fn get(&self, channel: usize, cell: [usize; 3], atom: usize, t: usize) -> f64 {
        self.data[self.offset(channel, cell, atom, t)].re
    }

    /// Stores a real observable value.
    pub fn set(&mut self, channel: usize, cell: [usize; 3], atom: usize, t: usize, value: f64) {
        let offset = self.offset(channel, cell, atom, t);
        self.data[offset] = Complex64::new(value, 0.0);
    }

    /// Contiguous `(x, y, z, t)` block for one channel and sublattice.
    pub fn block(&self, channel: usize, atom: usize) -> &[Complex64] {
        let len = self.shape.block_len();
        let start = (channel * self.shape.natoms + atom) * len;
        &self.data[start..start + len]
    }

    /// Mutable iterator over every `(channel, sublattice)` block.
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut [Complex64]> {
        let len = self.shape.block_len().max(1);
        self.data.chunks_mut(len)
    }

    /// Raw storage.
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    /// Fails with [`SqwError::ShapeMismatch`] unless the buffer has `expected` shape.
    pub fn check_shape(&self, expected: &BufferShape) -> SqwResult<()> {
        if &self.shape != expected {
            return Err(SqwError::ShapeMismatch(
                ErrorInfo::new("buffer-shape", "sample buffer does not match the accumulator grid")
                    .with_context("expected", format!("{:?}", expected.as_vec()))
                    .with_context("actual", format!("{:?}", self.shape.as_vec())),
            ));
        }
        Ok(())
    }

    /// Removes the time average at every `(channel, site, sublattice)`.
    ///
    /// This zeroes the elastic `ω = 0` line at every momentum. A buffer with a
    /// single snapshot has no energy axis; there the mean over cells of each
    /// `(channel, sublattice)` block is removed instead, zeroing `q = 0`.
    pub fn subtract_mean(&mut self) {
        let n_time = self.shape.n_time;
        let line_len = if n_time > 1 {
            n_time
        } else {
            self.shape.block_len().max(1)
        };
        for line in self.data.chunks_mut(line_len) {
            let mean = line.iter().sum::<Complex64>() / line.len() as f64;
            for value in line.iter_mut() {
                *value -= mean;
            }
        }
    }

    /// Replaces snapshots `t` and `N − 1 − t` by their average at every site.
    pub fn symmetrize_time(&mut self) {
        let n_time = self.shape.n_time;
        if n_time < 2 {
            return;
        }
        for site in self.data.chunks_mut(n_time) {
            for t in 0..n_time / 2 {
                let partner = n_time - 1 - t;
                let average = (site[t] + site[partner]) * 0.5;
                site[t] = average;
                site[partner] = average;
            }
        }
    }
}
