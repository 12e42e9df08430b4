//! Classical-to-quantum intensity correction.

use sqw_core::{ErrorInfo, SqwError, SqwResult};

/// Rescales a classical correlation at energy `omega` toward its quantum
/// counterpart at temperature `kt`.
///
/// ```text
/// ω > 0:   ω / (kT (1 − e^{−ω/kT}))
/// ω = 0:   1
/// ω < 0:  −ω e^{ω/kT} / (kT (1 − e^{ω/kT}))
/// ```
///
/// `kt = +∞` gives 1 for every energy. Callers validate `kt` with
/// [`validate_temperature`] first.
pub fn classical_to_quantum(omega: f64, kt: f64) -> f64 {
    if kt == f64::INFINITY || omega == 0.0 {
        return 1.0;
    }
    let x = omega / kt;
    if omega > 0.0 {
        // 1 − e^{−x} = −expm1(−x)
        omega / (kt * -(-x).exp_m1())
    } else {
        -omega * x.exp() / (kt * -x.exp_m1())
    }
}

/// Accepts `kt > 0` (including `+∞`); rejects zero, negative values and NaN.
pub fn validate_temperature(kt: f64) -> SqwResult<()> {
    if kt.is_nan() || kt <= 0.0 {
        return Err(SqwError::InvalidTemperature(
            ErrorInfo::new("nonpositive-kt", "temperature must be strictly positive")
                .with_context("kt", kt.to_string()),
        ));
    }
    Ok(())
}
