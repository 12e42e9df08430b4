#![deny(missing_docs)]
//! Read-only intensity queries over a [`sqw_corr::CorrelationAccumulator`].
//!
//! An [`IntensityFormula`] bundles a [`Contraction`] strategy with optional
//! form factors and temperature. [`Intensities`] validates a formula against
//! one accumulator and answers wave-vector, equal-time and binned queries.
//! Any number of `Intensities` values may borrow the same accumulator; the
//! borrow keeps `add_sample` out while they exist.

pub mod binning;
pub mod broadening;
pub mod engine;
pub mod form_factor;
pub mod formula;
pub mod temperature;
pub mod wavevector;

pub use binning::{AxisBins, BinnedIntensities, BinningParameters};
pub use broadening::{broaden_energy, gaussian, lorentzian};
pub use engine::{EnergySelection, Intensities, IntensityTable, QueryOptions};
pub use form_factor::{FormFactor, J0Expansion};
pub use formula::{
    Contraction, ContractionKind, CorrelationMatrix, CorrelationSlice, IntensityFormula,
    IntensityValue, QueryPoint,
};
pub use temperature::{classical_to_quantum, validate_temperature};
pub use wavevector::{InterpolationMode, ReciprocalFrame, Stencil, Wavevector};
