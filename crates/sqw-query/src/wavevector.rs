//! Wave-vector frames and grid lookup stencils.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};
use sqw_corr::{Grid, LatticeGeometry};

// Grid coordinates closer than this to an integer are treated as on-grid.
const SNAP_TOLERANCE: f64 = 1e-10;

/// Requested momentum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", content = "q", rename_all = "kebab-case")]
pub enum Wavevector {
    /// Reciprocal lattice units (components along `b_1, b_2, b_3`).
    Lattice([f64; 3]),
    /// Cartesian momentum in inverse length units.
    Physical([f64; 3]),
}

/// How an arbitrary momentum is mapped onto the periodic grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationMode {
    /// Snap to the closest grid point.
    #[default]
    Nearest,
    /// Blend the up to eight surrounding grid points.
    Trilinear,
}

/// Conversion between lattice and Cartesian reciprocal coordinates.
///
/// With lattice vectors `a_i` as columns of `A`, the reciprocal basis is
/// `B = 2π A^{−T}`, so that `a_i · b_j = 2π δ_ij`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReciprocalFrame {
    recip: Matrix3<f64>,
    recip_inv: Matrix3<f64>,
}

impl ReciprocalFrame {
    /// Builds the frame from real-space lattice vectors.
    pub fn new(geometry: &LatticeGeometry) -> SqwResult<Self> {
        let [a1, a2, a3] = geometry.vectors;
        let direct =
            Matrix3::from_columns(&[Vector3::from(a1), Vector3::from(a2), Vector3::from(a3)]);
        let inverse = direct.try_inverse().ok_or_else(|| {
            SqwError::Configuration(
                ErrorInfo::new("singular-lattice", "lattice vectors are linearly dependent")
                    .with_context("vectors", format!("{:?}", geometry.vectors)),
            )
        })?;
        Ok(Self {
            recip: inverse.transpose() * (2.0 * PI),
            recip_inv: direct.transpose() / (2.0 * PI),
        })
    }

    /// Cartesian momentum of a lattice-unit wave vector.
    pub fn to_cartesian(&self, q: [f64; 3]) -> [f64; 3] {
        let v = self.recip * Vector3::from(q);
        [v.x, v.y, v.z]
    }

    /// Lattice-unit components of a Cartesian momentum.
    pub fn to_lattice(&self, q: [f64; 3]) -> [f64; 3] {
        let v = self.recip_inv * Vector3::from(q);
        [v.x, v.y, v.z]
    }

    /// Both representations of a requested wave vector, `(lattice, cartesian)`.
    pub fn resolve(&self, q: &Wavevector) -> ([f64; 3], [f64; 3]) {
        match *q {
            Wavevector::Lattice(rlu) => (rlu, self.to_cartesian(rlu)),
            Wavevector::Physical(cart) => (self.to_lattice(cart), cart),
        }
    }
}

/// Weighted grid points contributing to one momentum query.
#[derive(Debug, Clone, PartialEq)]
pub struct Stencil {
    /// `(momentum index, weight)` pairs; weights are positive and sum to one.
    pub points: Vec<([usize; 3], f64)>,
}

impl Stencil {
    /// Stencil for lattice-unit momentum `q` on `grid`.
    pub fn new(grid: &Grid, q: [f64; 3], mode: InterpolationMode) -> Self {
        match mode {
            InterpolationMode::Nearest => Self::nearest(grid, q),
            InterpolationMode::Trilinear => Self::trilinear(grid, q),
        }
    }

    fn nearest(grid: &Grid, q: [f64; 3]) -> Self {
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let position = q[axis] * grid.lattice_size[axis] as f64;
            index[axis] = grid.wrap_momentum(axis, position.round() as i64);
        }
        Self {
            points: vec![(index, 1.0)],
        }
    }

    fn trilinear(grid: &Grid, q: [f64; 3]) -> Self {
        let mut base = [0i64; 3];
        let mut frac = [0.0f64; 3];
        for axis in 0..3 {
            let position = q[axis] * grid.lattice_size[axis] as f64;
            let nearest = position.round();
            if (position - nearest).abs() < SNAP_TOLERANCE {
                base[axis] = nearest as i64;
            } else {
                let floor = position.floor();
                base[axis] = floor as i64;
                frac[axis] = position - floor;
            }
        }
        let mut points = Vec::with_capacity(8);
        for corner in 0..8usize {
            let mut index = [0usize; 3];
            let mut weight = 1.0;
            for axis in 0..3 {
                let upper = (corner >> axis) & 1 == 1;
                weight *= if upper { frac[axis] } else { 1.0 - frac[axis] };
                let offset = if upper { 1 } else { 0 };
                index[axis] = grid.wrap_momentum(axis, base[axis] + offset);
            }
            if weight > 0.0 {
                points.push((index, weight));
            }
        }
        Self { points }
    }
}
