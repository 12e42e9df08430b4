use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};

use crate::buffer::BufferShape;
use crate::config::CorrelationConfig;

// Relative slack when comparing omega_max against the Nyquist limit pi / dt.
const NYQUIST_SLACK: f64 = 1e-12;

/// Momentum/energy grid fixed at accumulator construction.
///
/// Momenta are the points `m_i / L_i` (reciprocal lattice units) of the
/// periodic lattice. Energies follow FFT ordering over `n_time = 2·nomega − 1`
/// bins: index `n < nomega` carries `n·Δω`, the remaining indices carry the
/// negative energies `(n − n_time)·Δω`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Linear lattice dimensions `(L1, L2, L3)`.
    pub lattice_size: [usize; 3],
    /// Number of sublattices per cell.
    pub natoms: usize,
    /// Number of observable channels.
    pub nchannels: usize,
    /// Number of non-negative energies.
    pub nomega: usize,
    /// Length of the time axis, `2·nomega − 1`.
    pub n_time: usize,
    /// Integrator steps between consecutive snapshots.
    pub measperiod: usize,
    /// Integrator time step.
    pub dt: f64,
    /// Energy spacing `2π / (Δt · measperiod · n_time)`; zero for equal-time grids.
    pub delta_omega: f64,
}

impl Grid {
    /// Validates the configuration and derives the grid.
    pub fn from_config(config: &CorrelationConfig) -> SqwResult<Self> {
        config.validate()?;
        let nomega = config.nomega;
        let n_time = 2 * nomega - 1;
        let (measperiod, delta_omega) = if nomega == 1 {
            (1, 0.0)
        } else {
            let dt = config.dt;
            if !dt.is_finite() || dt <= 0.0 {
                return Err(SqwError::Configuration(
                    ErrorInfo::new("invalid-dt", "time step must be finite and positive")
                        .with_context("dt", dt.to_string()),
                ));
            }
            let nyquist = PI / dt;
            let omega_max = config.omega_max.unwrap_or(nyquist);
            if !omega_max.is_finite() || omega_max <= 0.0 {
                return Err(SqwError::Configuration(
                    ErrorInfo::new("invalid-omega-max", "omega_max must be finite and positive")
                        .with_context("omega_max", omega_max.to_string()),
                ));
            }
            let ratio = nyquist / omega_max;
            if ratio < 1.0 - NYQUIST_SLACK {
                return Err(SqwError::Configuration(
                    ErrorInfo::new(
                        "omega-max-too-large",
                        "omega_max is not resolvable with the given time step",
                    )
                    .with_context("dt", dt.to_string())
                    .with_context("omega_max", omega_max.to_string())
                    .with_context("nyquist", nyquist.to_string())
                    .with_hint("choose a smaller dt or a smaller omega_max"),
                ));
            }
            let measperiod = ((ratio + NYQUIST_SLACK).floor() as usize).max(1);
            let delta_omega = 2.0 * PI / (dt * measperiod as f64 * n_time as f64);
            (measperiod, delta_omega)
        };
        Ok(Self {
            lattice_size: config.lattice_size,
            natoms: config.geometry.natoms(),
            nchannels: config.nchannels(),
            nomega,
            n_time,
            measperiod,
            dt: config.dt,
            delta_omega,
        })
    }

    /// Whether the grid carries no energy axis.
    pub fn is_static(&self) -> bool {
        self.nomega == 1
    }

    /// Number of unit cells.
    pub fn ncells(&self) -> usize {
        self.lattice_size.iter().product()
    }

    /// Number of `(q, ω)` points in one sublattice-pair block.
    pub fn block_len(&self) -> usize {
        self.ncells() * self.n_time
    }

    /// Shape every incoming sample buffer must have.
    pub fn buffer_shape(&self) -> BufferShape {
        BufferShape {
            nchannels: self.nchannels,
            lattice_size: self.lattice_size,
            natoms: self.natoms,
            n_time: self.n_time,
        }
    }

    /// Signed energy of grid index `n`.
    pub fn energy(&self, n: usize) -> f64 {
        if n < self.nomega {
            n as f64 * self.delta_omega
        } else {
            (n as f64 - self.n_time as f64) * self.delta_omega
        }
    }

    /// Energies on the grid.
    ///
    /// With `negative_energies == false` only the `nomega` non-negative
    /// energies are returned (indices `0..nomega`). Otherwise all `n_time`
    /// energies are returned in FFT order, the upper half back-folded to
    /// negative values.
    pub fn available_energies(&self, negative_energies: bool) -> Vec<f64> {
        let count = if negative_energies {
            self.n_time
        } else {
            self.nomega
        };
        (0..count).map(|n| self.energy(n)).collect()
    }

    /// Grid index of the energy nearest to `omega`.
    pub fn energy_index(&self, omega: f64) -> SqwResult<usize> {
        if self.is_static() {
            return Ok(0);
        }
        let steps = (omega / self.delta_omega).round();
        let limit = (self.nomega - 1) as f64;
        if !steps.is_finite() || steps.abs() > limit {
            return Err(SqwError::Configuration(
                ErrorInfo::new("energy-out-of-range", "requested energy lies outside the grid")
                    .with_context("omega", omega.to_string())
                    .with_context("omega_limit", (limit * self.delta_omega).to_string()),
            ));
        }
        let steps = steps as i64;
        Ok(steps.rem_euclid(self.n_time as i64) as usize)
    }

    /// Index of the energy `−ω` for grid index `n`.
    pub fn negated_energy_index(&self, n: usize) -> usize {
        (self.n_time - n) % self.n_time
    }

    /// Wraps an integer momentum index along `axis` into the periodic grid.
    pub fn wrap_momentum(&self, axis: usize, m: i64) -> usize {
        m.rem_euclid(self.lattice_size[axis] as i64) as usize
    }

    /// Flat cell index of `[x, y, z]`.
    pub fn cell_index(&self, cell: [usize; 3]) -> usize {
        let [_, l2, l3] = self.lattice_size;
        (cell[0] * l2 + cell[1]) * l3 + cell[2]
    }

    /// Grid momenta in reciprocal lattice units covering `bzsize` zones per axis.
    pub fn available_wave_vectors(&self, bzsize: [usize; 3]) -> Vec<[f64; 3]> {
        let [l1, l2, l3] = self.lattice_size;
        let (n1, n2, n3) = (l1 * bzsize[0], l2 * bzsize[1], l3 * bzsize[2]);
        let mut qs = Vec::with_capacity(n1 * n2 * n3);
        for a in 0..n1 {
            for b in 0..n2 {
                for c in 0..n3 {
                    qs.push([
                        a as f64 / l1 as f64,
                        b as f64 / l2 as f64,
                        c as f64 / l3 as f64,
                    ]);
                }
            }
        }
        qs
    }
}
