//! Validated intensity queries over one accumulator.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};
use sqw_corr::{CorrelationAccumulator, PairRef};
use tracing::debug;

use crate::broadening::broaden_energy;
use crate::form_factor::FormFactor;
use crate::formula::{CorrelationSlice, IntensityFormula, IntensityValue, QueryPoint};
use crate::temperature::{classical_to_quantum, validate_temperature};
use crate::wavevector::{InterpolationMode, ReciprocalFrame, Stencil, Wavevector};

// Grid coordinates beyond this are no longer exactly representable offsets.
const MAX_GRID_POSITION: f64 = (1u64 << 52) as f64;

/// Energies a query returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EnergySelection {
    /// The `nomega` non-negative grid energies.
    #[default]
    NonNegative,
    /// All `n_time` grid energies in FFT order, negatives back-folded.
    Signed,
    /// Grid energies nearest to each listed value.
    Values(Vec<f64>),
}

/// Query-time options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryOptions {
    /// Momentum lookup mode.
    #[serde(default)]
    pub interpolation: InterpolationMode,
    /// Energy selection.
    #[serde(default)]
    pub energies: EnergySelection,
}

/// Intensities for a list of wave vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityTable<T> {
    /// Grid energies of the inner index.
    pub energies: Vec<f64>,
    /// `intensities[q][e]`.
    pub intensities: Vec<Vec<T>>,
}

impl<T: IntensityValue> IntensityTable<T> {
    /// Convolves every row along energy with `kernel(ω, ω₀)`.
    pub fn broaden<K>(&self, kernel: K) -> SqwResult<Self>
    where
        K: Fn(f64, f64) -> f64,
    {
        let intensities = self
            .intensities
            .iter()
            .map(|row| broaden_energy(row, &self.energies, &kernel))
            .collect::<SqwResult<Vec<_>>>()?;
        Ok(Self {
            energies: self.energies.clone(),
            intensities,
        })
    }
}

/// Intensity calculator bound to a read-only accumulator.
#[derive(Debug, Clone)]
pub struct Intensities<'a, T> {
    accumulator: &'a CorrelationAccumulator,
    frame: ReciprocalFrame,
    formula: IntensityFormula<T>,
    pairs: Vec<PairRef>,
    kt: Option<f64>,
}

impl<'a, T: IntensityValue> Intensities<'a, T> {
    /// Validates `formula` against `accumulator`.
    ///
    /// Fails with `Lookup` for an unregistered channel pair, with
    /// `InvalidTemperature` for `kT ≤ 0`, and with `Configuration` for a
    /// form-factor count that differs from the sublattice count or a finite
    /// temperature on equal-time data.
    pub fn new(
        accumulator: &'a CorrelationAccumulator,
        formula: IntensityFormula<T>,
    ) -> SqwResult<Self> {
        let grid = accumulator.grid();
        let pairs = formula
            .contraction
            .required()
            .iter()
            .map(|&(a, b)| accumulator.resolve_pair(a, b))
            .collect::<SqwResult<Vec<_>>>()?;
        if let Some(form_factors) = &formula.form_factors {
            if form_factors.len() != grid.natoms {
                return Err(SqwError::Configuration(
                    ErrorInfo::new(
                        "form-factor-count",
                        "one form factor is required per sublattice",
                    )
                    .with_context("expected", grid.natoms.to_string())
                    .with_context("actual", form_factors.len().to_string()),
                ));
            }
        }
        let kt = match formula.kt {
            Some(kt) => {
                validate_temperature(kt)?;
                if kt == f64::INFINITY {
                    None
                } else if grid.is_static() {
                    return Err(SqwError::Configuration(
                        ErrorInfo::new(
                            "static-temperature",
                            "temperature correction needs an energy axis",
                        )
                        .with_context("kt", kt.to_string())
                        .with_hint("accumulate with nomega > 1 or drop the temperature"),
                    ));
                } else {
                    Some(kt)
                }
            }
            None => None,
        };
        let frame = ReciprocalFrame::new(&accumulator.config().geometry)?;
        debug!(
            kind = ?formula.contraction.kind(),
            pairs = pairs.len(),
            form_factors = formula.form_factors.is_some(),
            kt = ?kt,
            "built intensity formula"
        );
        Ok(Self {
            accumulator,
            frame,
            formula,
            pairs,
            kt,
        })
    }

    /// Underlying accumulator.
    pub fn accumulator(&self) -> &'a CorrelationAccumulator {
        self.accumulator
    }

    /// Reciprocal frame of the accumulator's lattice.
    pub fn frame(&self) -> &ReciprocalFrame {
        &self.frame
    }

    /// Grid energy indices selected by `selection`.
    pub fn energy_indices(&self, selection: &EnergySelection) -> SqwResult<Vec<usize>> {
        let grid = self.accumulator.grid();
        match selection {
            EnergySelection::NonNegative => Ok((0..grid.nomega).collect()),
            EnergySelection::Signed => Ok((0..grid.n_time).collect()),
            EnergySelection::Values(values) => {
                values.iter().map(|&omega| grid.energy_index(omega)).collect()
            }
        }
    }

    /// Intensities at each wave vector for the selected energies.
    ///
    /// Non-finite wave vectors fail with `Configuration`.
    pub fn intensities(
        &self,
        qs: &[Wavevector],
        options: &QueryOptions,
    ) -> SqwResult<IntensityTable<T>> {
        let grid = self.accumulator.grid();
        let indices = self.energy_indices(&options.energies)?;
        let intensities = qs
            .iter()
            .map(|q| {
                let query = self.prepare(q, options.interpolation)?;
                Ok(indices.iter().map(|&w| self.evaluate(&query, w)).collect())
            })
            .collect::<SqwResult<Vec<Vec<T>>>>()?;
        Ok(IntensityTable {
            energies: indices.iter().map(|&w| grid.energy(w)).collect(),
            intensities,
        })
    }

    /// Equal-time intensities `(1 / n_time) Σ_ω I(q, ω)` over the full
    /// signed energy grid.
    pub fn instant_intensities(
        &self,
        qs: &[Wavevector],
        options: &QueryOptions,
    ) -> SqwResult<Vec<T>> {
        let n_time = self.accumulator.grid().n_time;
        let norm = 1.0 / n_time as f64;
        qs.iter()
            .map(|q| {
                let query = self.prepare(q, options.interpolation)?;
                let mut total = self.evaluate(&query, 0);
                for w in 1..n_time {
                    total.add_scaled(&self.evaluate(&query, w), 1.0);
                }
                total.scale(norm);
                Ok(total)
            })
            .collect()
    }

    pub(crate) fn prepare(
        &self,
        q: &Wavevector,
        mode: InterpolationMode,
    ) -> SqwResult<PreparedQuery> {
        let grid = self.accumulator.grid();
        let (q_rlu, q_cart) = self.frame.resolve(q);
        let on_grid = (0..3).all(|axis| {
            let position = q_rlu[axis] * grid.lattice_size[axis] as f64;
            position.is_finite() && position.abs() <= MAX_GRID_POSITION
        });
        if !on_grid || q_cart.iter().any(|component| !component.is_finite()) {
            return Err(SqwError::Configuration(
                ErrorInfo::new("invalid-wavevector", "wave vector must be finite")
                    .with_context("q", format!("{q:?}")),
            ));
        }
        let natoms = grid.natoms;
        let positions = &self.accumulator.config().geometry.positions;
        let q_norm = q_cart.iter().map(|c| c * c).sum::<f64>().sqrt();
        let weights = self
            .formula
            .form_factors
            .as_ref()
            .map(|ffs| ffs.iter().map(|ff: &FormFactor| ff.eval(q_norm)).collect::<Vec<_>>());
        let mut factors = Vec::with_capacity(natoms * natoms);
        for j in 0..natoms {
            for k in 0..natoms {
                let dr = [
                    positions[k][0] - positions[j][0],
                    positions[k][1] - positions[j][1],
                    positions[k][2] - positions[j][2],
                ];
                let arg = 2.0 * PI * (q_rlu[0] * dr[0] + q_rlu[1] * dr[1] + q_rlu[2] * dr[2]);
                let mut factor = Complex64::from_polar(1.0, arg);
                if let Some(weights) = &weights {
                    factor *= weights[j] * weights[k].conj();
                }
                factors.push(factor);
            }
        }
        Ok(PreparedQuery {
            q_rlu,
            q_cart,
            stencil: Stencil::new(grid, q_rlu, mode),
            factors,
        })
    }

    fn slice(&self, query: &PreparedQuery, q: [usize; 3], w: usize) -> CorrelationSlice<'_> {
        let natoms = self.accumulator.grid().natoms;
        let values = self
            .pairs
            .iter()
            .map(|&pair| {
                let mut total = Complex64::new(0.0, 0.0);
                for j in 0..natoms {
                    for k in 0..natoms {
                        let entry = self.accumulator.mean_at(pair, j, k, q, w);
                        total += query.factors[j * natoms + k] * entry;
                    }
                }
                total
            })
            .collect();
        CorrelationSlice {
            pairs: self.formula.contraction.required(),
            values,
        }
    }

    pub(crate) fn evaluate(&self, query: &PreparedQuery, w: usize) -> T {
        let omega = self.accumulator.grid().energy(w);
        let point = QueryPoint {
            q_rlu: query.q_rlu,
            q_cart: query.q_cart,
            omega,
        };
        let corner = |&(q, weight): &([usize; 3], f64)| {
            let slice = self.slice(query, q, w);
            (self.formula.contraction.apply(&point, &slice), weight)
        };
        // Stencils of prepared queries always carry at least one corner.
        let (mut value, first_weight) = corner(&query.stencil.points[0]);
        if first_weight != 1.0 {
            value.scale(first_weight);
        }
        for (other, weight) in query.stencil.points[1..].iter().map(corner) {
            value.add_scaled(&other, weight);
        }
        if let Some(kt) = self.kt {
            value.scale(classical_to_quantum(omega, kt));
        }
        value
    }
}

/// Per-wave-vector state reused across energies.
#[derive(Debug, Clone)]
pub(crate) struct PreparedQuery {
    q_rlu: [f64; 3],
    q_cart: [f64; 3],
    stencil: Stencil,
    factors: Vec<Complex64>,
}
