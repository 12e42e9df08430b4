//! Energy broadening of computed intensities.

use std::f64::consts::PI;

use sqw_core::{ErrorInfo, SqwError, SqwResult};

use crate::formula::IntensityValue;

/// Dense convolution of `values` (sampled at `energies`) with `kernel(ω, ω₀)`.
///
/// Each input bin `j` spreads its value over every output bin `i` with weight
/// `kernel(ω_i, ω_j) / Σ_i' kernel(ω_i', ω_j)`, so the total weight of the
/// row is conserved.
pub fn broaden_energy<T, K>(values: &[T], energies: &[f64], kernel: K) -> SqwResult<Vec<T>>
where
    T: IntensityValue,
    K: Fn(f64, f64) -> f64,
{
    if values.len() != energies.len() {
        return Err(SqwError::ShapeMismatch(
            ErrorInfo::new("broadening-length", "one energy is required per intensity")
                .with_context("values", values.len().to_string())
                .with_context("energies", energies.len().to_string()),
        ));
    }
    let n = energies.len();
    let mut weights = vec![0.0; n * n];
    for (j, &source) in energies.iter().enumerate() {
        let mut norm = 0.0;
        for (i, &target) in energies.iter().enumerate() {
            let weight = kernel(target, source);
            weights[i * n + j] = weight;
            norm += weight;
        }
        if !(norm.is_finite() && norm > 0.0) {
            return Err(SqwError::Configuration(
                ErrorInfo::new("degenerate-kernel", "kernel has no positive finite weight")
                    .with_context("energy", source.to_string())
                    .with_context("kernel_sum", norm.to_string()),
            ));
        }
        for i in 0..n {
            weights[i * n + j] /= norm;
        }
    }
    Ok((0..n)
        .map(|i| {
            let row = &weights[i * n..(i + 1) * n];
            let mut total = values[0].clone();
            total.scale(row[0]);
            for (value, &weight) in values.iter().zip(row).skip(1) {
                total.add_scaled(value, weight);
            }
            total
        })
        .collect())
}

/// Normalized Lorentzian with full width at half maximum `fwhm`.
pub fn lorentzian(fwhm: f64) -> impl Fn(f64, f64) -> f64 + Clone + Send + Sync {
    let gamma = fwhm / 2.0;
    move |omega, omega0| {
        let d = omega - omega0;
        gamma / (PI * (d * d + gamma * gamma))
    }
}

/// Normalized Gaussian with full width at half maximum `fwhm`.
pub fn gaussian(fwhm: f64) -> impl Fn(f64, f64) -> f64 + Clone + Send + Sync {
    let sigma = fwhm / (2.0 * (2.0 * 2f64.ln()).sqrt());
    let norm = 1.0 / (sigma * (2.0 * PI).sqrt());
    move |omega, omega0| {
        let d = (omega - omega0) / sigma;
        norm * (-0.5 * d * d).exp()
    }
}
