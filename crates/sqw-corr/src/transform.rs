use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use sqw_core::SqwResult;

use crate::buffer::{BufferShape, SampleBuffer};

/// Normalized forward DFT over the three spatial axes and the time axis.
///
/// Plans are built once for the accumulator's grid and reused for every
/// sample. The transform uses the `e^{−i k·x}` sign convention and scales
/// by `1 / sqrt(L1·L2·L3·n_time)`, so that the grid average of `|F|²`
/// equals the site-and-time average of the squared observable.
#[derive(Clone)]
pub struct FourierPlan {
    shape: BufferShape,
    // Axis order: x, y, z, t.
    axes: [Arc<dyn Fft<f64>>; 4],
    scratch_len: usize,
    norm: f64,
}

impl fmt::Debug for FourierPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FourierPlan")
            .field("shape", &self.shape)
            .field("norm", &self.norm)
            .finish_non_exhaustive()
    }
}

impl FourierPlan {
    /// Plans the transform for buffers of the given shape.
    pub fn new(shape: BufferShape) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let [l1, l2, l3] = shape.lattice_size;
        let axes = [
            planner.plan_fft_forward(l1),
            planner.plan_fft_forward(l2),
            planner.plan_fft_forward(l3),
            planner.plan_fft_forward(shape.n_time),
        ];
        let scratch_len = axes
            .iter()
            .map(|fft| fft.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);
        let norm = 1.0 / (shape.block_len() as f64).sqrt();
        Self {
            shape,
            axes,
            scratch_len,
            norm,
        }
    }

    /// Shape of the buffers this plan transforms.
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    /// Transforms the buffer in place.
    pub fn transform(&self, buffer: &mut SampleBuffer) -> SqwResult<()> {
        buffer.check_shape(&self.shape)?;
        let mut scratch = vec![Complex64::new(0.0, 0.0); self.scratch_len];
        let mut line = Vec::new();
        for block in buffer.blocks_mut() {
            self.transform_block(block, &mut line, &mut scratch);
        }
        Ok(())
    }

    fn transform_block(
        &self,
        block: &mut [Complex64],
        line: &mut Vec<Complex64>,
        scratch: &mut [Complex64],
    ) {
        let [l1, l2, l3] = self.shape.lattice_size;
        let n_time = self.shape.n_time;
        // Time is the fastest axis, so its lines are contiguous.
        if n_time > 1 {
            self.axes[3].process_with_scratch(block, scratch);
        }
        let strides = [l2 * l3 * n_time, l3 * n_time, n_time];
        let lengths = [l1, l2, l3];
        for axis in 0..3 {
            let len = lengths[axis];
            if len > 1 {
                strided_fft(&*self.axes[axis], block, len, strides[axis], line, scratch);
            }
        }
        for value in block.iter_mut() {
            *value *= self.norm;
        }
    }
}

fn strided_fft(
    fft: &dyn Fft<f64>,
    block: &mut [Complex64],
    len: usize,
    stride: usize,
    line: &mut Vec<Complex64>,
    scratch: &mut [Complex64],
) {
    let span = len * stride;
    line.resize(len, Complex64::new(0.0, 0.0));
    for outer in (0..block.len()).step_by(span) {
        for inner in 0..stride {
            let base = outer + inner;
            for (i, slot) in line.iter_mut().enumerate() {
                *slot = block[base + i * stride];
            }
            fft.process_with_scratch(line, scratch);
            for (i, value) in line.iter().enumerate() {
                block[base + i * stride] = *value;
            }
        }
    }
}
