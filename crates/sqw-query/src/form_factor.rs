//! Momentum-dependent per-sublattice weights.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Coefficients of the dipolar `⟨j0⟩` expansion
/// `A e^{−a s²} + B e^{−b s²} + C e^{−c s²} + D` with `s = |q| / 4π`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct J0Expansion {
    /// Gaussian amplitudes `(A, B, C)`.
    pub amplitudes: [f64; 3],
    /// Gaussian widths `(a, b, c)`.
    pub widths: [f64; 3],
    /// Constant offset `D`.
    pub offset: f64,
}

impl J0Expansion {
    /// Evaluates the expansion at momentum magnitude `q`.
    pub fn eval(&self, q: f64) -> f64 {
        let s = q / (4.0 * PI);
        let s2 = s * s;
        self.amplitudes
            .iter()
            .zip(self.widths.iter())
            .map(|(amp, width)| amp * (-width * s2).exp())
            .sum::<f64>()
            + self.offset
    }
}

/// Complex, `|q|`-dependent multiplicative weight of one sublattice.
#[derive(Clone)]
pub enum FormFactor {
    /// Momentum-independent weight.
    Constant(Complex64),
    /// Dipolar `⟨j0⟩` approximation.
    J0(J0Expansion),
    /// Caller-supplied function of `|q|` (Cartesian, inverse length units).
    Custom(Arc<dyn Fn(f64) -> Complex64 + Send + Sync>),
}

impl fmt::Debug for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormFactor::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            FormFactor::J0(expansion) => f.debug_tuple("J0").field(expansion).finish(),
            FormFactor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FormFactor {
    /// Unit weight; equivalent to omitting form factors.
    pub fn unit() -> Self {
        FormFactor::Constant(Complex64::new(1.0, 0.0))
    }

    /// Wraps a closure of `|q|`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> Complex64 + Send + Sync + 'static,
    {
        FormFactor::Custom(Arc::new(f))
    }

    /// Weight at momentum magnitude `q`.
    pub fn eval(&self, q: f64) -> Complex64 {
        match self {
            FormFactor::Constant(value) => *value,
            FormFactor::J0(expansion) => Complex64::new(expansion.eval(q), 0.0),
            FormFactor::Custom(f) => f(q),
        }
    }
}
