//! Contraction strategies and the per-point correlation slice they consume.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sqw_corr::ChannelPair;

use crate::form_factor::FormFactor;

/// Value type produced by a contraction.
///
/// Interpolation, energy sums, broadening and bin averages combine values
/// only through these two linear operations.
pub trait IntensityValue: Clone + Send + Sync + 'static {
    /// Multiplies the value in place.
    fn scale(&mut self, factor: f64);
    /// Adds `factor · other` in place.
    fn add_scaled(&mut self, other: &Self, factor: f64);
}

impl IntensityValue for f64 {
    fn scale(&mut self, factor: f64) {
        *self *= factor;
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        *self += factor * other;
    }
}

impl IntensityValue for Complex64 {
    fn scale(&mut self, factor: f64) {
        *self *= factor;
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        *self += *other * factor;
    }
}

/// Dense channel-by-channel correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Number of channels along each side.
    pub dim: usize,
    /// Row-major entries, `entries[a * dim + b] = S_ab`.
    pub entries: Vec<Complex64>,
}

impl CorrelationMatrix {
    /// Entry `S_ab`.
    pub fn get(&self, a: usize, b: usize) -> Complex64 {
        self.entries[a * self.dim + b]
    }

    /// Sum of the diagonal.
    pub fn trace(&self) -> Complex64 {
        (0..self.dim).map(|a| self.get(a, a)).sum()
    }
}

impl IntensityValue for CorrelationMatrix {
    fn scale(&mut self, factor: f64) {
        for entry in &mut self.entries {
            *entry *= factor;
        }
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        for (entry, value) in self.entries.iter_mut().zip(other.entries.iter()) {
            *entry += *value * factor;
        }
    }
}

/// Momentum and energy at which a contraction is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryPoint {
    /// Requested momentum in reciprocal lattice units.
    pub q_rlu: [f64; 3],
    /// Requested momentum in Cartesian coordinates.
    pub q_cart: [f64; 3],
    /// Grid energy.
    pub omega: f64,
}

/// Sublattice-summed correlations of the required channel pairs at one
/// grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSlice<'a> {
    /// Channel pairs in `values` order.
    pub pairs: &'a [ChannelPair],
    /// `S_ab(q, ω)` for each pair.
    pub values: Vec<Complex64>,
}

impl CorrelationSlice<'_> {
    /// `S_ab`, served from `S_ba` by conjugation when only the reverse order is present.
    pub fn get(&self, a: usize, b: usize) -> Option<Complex64> {
        if let Some(index) = self.pairs.iter().position(|&pair| pair == (a, b)) {
            return Some(self.values[index]);
        }
        self.pairs
            .iter()
            .position(|&pair| pair == (b, a))
            .map(|index| self.values[index].conj())
    }

    /// Like [`get`](Self::get); pairs outside the slice read as zero.
    pub fn value(&self, a: usize, b: usize) -> Complex64 {
        self.get(a, b).unwrap_or_default()
    }
}

/// Tag of a contraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractionKind {
    /// `Σ_a Re S_aa`.
    Trace,
    /// Unpolarized neutron cross-section `Σ_ab (δ_ab − q̂_a q̂_b) Re S_ab`.
    Perpendicular,
    /// Every channel pair as a matrix.
    Full,
    /// Caller-supplied function.
    Custom,
}

type ContractFn<T> = dyn Fn(&QueryPoint, &CorrelationSlice) -> T + Send + Sync;

fn contract_fn<T, F>(f: F) -> Arc<ContractFn<T>>
where
    F: Fn(&QueryPoint, &CorrelationSlice) -> T + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Reduction of a [`CorrelationSlice`] to an intensity value.
pub struct Contraction<T> {
    kind: ContractionKind,
    required: Vec<ChannelPair>,
    calc: Arc<ContractFn<T>>,
}

impl<T> Clone for Contraction<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            required: self.required.clone(),
            calc: Arc::clone(&self.calc),
        }
    }
}

impl<T> fmt::Debug for Contraction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contraction")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

fn upper_pairs(channels: &[usize]) -> Vec<ChannelPair> {
    let mut pairs = Vec::new();
    for (i, &a) in channels.iter().enumerate() {
        for &b in &channels[i..] {
            if !pairs.contains(&(a, b)) && !pairs.contains(&(b, a)) {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

impl Contraction<f64> {
    /// Sum of the real diagonal correlations of `channels`.
    pub fn trace(channels: &[usize]) -> Self {
        let channels = channels.to_vec();
        let required = upper_pairs(&channels)
            .into_iter()
            .filter(|(a, b)| a == b)
            .collect();
        Self {
            kind: ContractionKind::Trace,
            required,
            calc: contract_fn(move |_: &QueryPoint, slice: &CorrelationSlice| -> f64 {
                channels.iter().map(|&c| slice.value(c, c).re).sum()
            }),
        }
    }

    /// Projection transverse to `q̂`, with `channels` the Cartesian x, y, z
    /// observables. At `q = 0` the projector is the identity.
    pub fn perpendicular(channels: [usize; 3]) -> Self {
        Self {
            kind: ContractionKind::Perpendicular,
            required: upper_pairs(&channels),
            calc: contract_fn(move |point: &QueryPoint, slice: &CorrelationSlice| -> f64 {
                let q = point.q_cart;
                let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2]).sqrt();
                let qhat = if norm > 0.0 {
                    [q[0] / norm, q[1] / norm, q[2] / norm]
                } else {
                    [0.0; 3]
                };
                let mut total = Complex64::new(0.0, 0.0);
                for a in 0..3 {
                    for b in 0..3 {
                        let delta = if a == b { 1.0 } else { 0.0 };
                        let weight = delta - qhat[a] * qhat[b];
                        if weight != 0.0 {
                            total += slice.value(channels[a], channels[b]) * weight;
                        }
                    }
                }
                total.re
            }),
        }
    }
}

impl Contraction<CorrelationMatrix> {
    /// Every correlation among `channels`, in the given order.
    pub fn full(channels: &[usize]) -> Self {
        let channels = channels.to_vec();
        Self {
            kind: ContractionKind::Full,
            required: upper_pairs(&channels),
            calc: contract_fn(move |_: &QueryPoint, slice: &CorrelationSlice| {
                let dim = channels.len();
                let mut entries = Vec::with_capacity(dim * dim);
                for &a in &channels {
                    for &b in &channels {
                        entries.push(slice.value(a, b));
                    }
                }
                CorrelationMatrix { dim, entries }
            }),
        }
    }
}

impl<T: IntensityValue> Contraction<T> {
    /// Wraps a caller function reading the `required` channel pairs.
    pub fn custom<F>(required: Vec<ChannelPair>, f: F) -> Self
    where
        F: Fn(&QueryPoint, &CorrelationSlice) -> T + Send + Sync + 'static,
    {
        Self {
            kind: ContractionKind::Custom,
            required,
            calc: contract_fn(f),
        }
    }

    /// Strategy tag.
    pub fn kind(&self) -> ContractionKind {
        self.kind
    }

    /// Channel pairs the contraction reads.
    pub fn required(&self) -> &[ChannelPair] {
        &self.required
    }

    /// Evaluates the contraction.
    pub fn apply(&self, point: &QueryPoint, slice: &CorrelationSlice) -> T {
        (self.calc)(point, slice)
    }
}

/// Contraction plus the optional form factors and temperature it is
/// evaluated with.
#[derive(Debug, Clone)]
pub struct IntensityFormula<T> {
    /// Reduction strategy.
    pub contraction: Contraction<T>,
    /// One weight per sublattice; `None` means unit weights.
    pub form_factors: Option<Vec<FormFactor>>,
    /// Temperature for the classical-to-quantum correction; `None` disables it.
    pub kt: Option<f64>,
}

impl<T: IntensityValue> IntensityFormula<T> {
    /// Formula without form factors or temperature correction.
    pub fn new(contraction: Contraction<T>) -> Self {
        Self {
            contraction,
            form_factors: None,
            kt: None,
        }
    }

    /// Sets per-sublattice form factors.
    pub fn with_form_factors(mut self, form_factors: Vec<FormFactor>) -> Self {
        self.form_factors = Some(form_factors);
        self
    }

    /// Sets the temperature `kT`.
    pub fn with_temperature(mut self, kt: f64) -> Self {
        self.kt = Some(kt);
        self
    }
}
