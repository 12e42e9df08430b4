use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SqwError, SqwResult};

/// Ordered pair of channel indices `(α, β)` whose correlation `⟨A_α A_β*⟩` is stored.
pub type ChannelPair = (usize, usize);

fn config_error(code: &str, message: impl Into<String>) -> SqwError {
    SqwError::Configuration(ErrorInfo::new(code, message))
}

fn default_channels() -> Vec<String> {
    vec!["Sx".to_string(), "Sy".to_string(), "Sz".to_string()]
}

fn default_nomega() -> usize {
    1
}

fn default_vectors() -> [[f64; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

fn default_positions() -> Vec<[f64; 3]> {
    vec![[0.0, 0.0, 0.0]]
}

/// Crystal geometry of the unit cell.
///
/// `vectors[i]` is the Cartesian lattice vector `a_i`; `positions` holds the
/// fractional coordinates of every sublattice in the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeGeometry {
    /// Real-space lattice vectors `a_1, a_2, a_3` (Cartesian rows).
    #[serde(default = "default_vectors")]
    pub vectors: [[f64; 3]; 3],
    /// Fractional position of every sublattice.
    #[serde(default = "default_positions")]
    pub positions: Vec<[f64; 3]>,
}

impl Default for LatticeGeometry {
    fn default() -> Self {
        Self {
            vectors: default_vectors(),
            positions: default_positions(),
        }
    }
}

impl LatticeGeometry {
    /// Cubic cell with unit lattice constant and the given sublattice positions.
    pub fn cubic(positions: Vec<[f64; 3]>) -> Self {
        Self {
            vectors: default_vectors(),
            positions,
        }
    }

    /// Number of sublattices in the unit cell.
    pub fn natoms(&self) -> usize {
        self.positions.len()
    }
}

/// Raw-buffer hooks applied before the Fourier transform of each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preprocess {
    /// Remove the time average at every site, dropping the elastic `ω = 0` line.
    #[serde(default)]
    pub subtract_mean: bool,
    /// Average snapshots `t` and `N − 1 − t` to enforce time-reversal symmetry.
    #[serde(default)]
    pub symmetrize_time: bool,
}

/// Construction-time parameters of a correlation accumulator.
///
/// Everything here is fixed once the accumulator exists; the derived
/// [`crate::Grid`] never resizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Linear lattice dimensions `(L1, L2, L3)` in unit cells.
    pub lattice_size: [usize; 3],
    /// Unit-cell geometry; the number of positions fixes the sublattice count.
    #[serde(default)]
    pub geometry: LatticeGeometry,
    /// Ordered observable channel names.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Channel pairs to accumulate. `None` stores every pair `(i, j)` with `i <= j`.
    #[serde(default)]
    pub pairs: Option<Vec<ChannelPair>>,
    /// Integrator time step `Δt`.
    pub dt: f64,
    /// Number of non-negative energy bins. `1` selects equal-time accumulation.
    #[serde(default = "default_nomega")]
    pub nomega: usize,
    /// Largest resolvable energy. Defaults to the Nyquist limit `π / Δt`.
    #[serde(default)]
    pub omega_max: Option<f64>,
    /// Whether running second moments are tracked alongside the means.
    #[serde(default)]
    pub track_variance: bool,
    /// Hooks applied to each raw buffer before it is transformed.
    #[serde(default)]
    pub preprocess: Preprocess,
}

impl CorrelationConfig {
    /// Dynamical configuration with default channels (`Sx`, `Sy`, `Sz`) on a
    /// single-site cubic cell.
    pub fn dynamical(lattice_size: [usize; 3], dt: f64, nomega: usize, omega_max: f64) -> Self {
        Self {
            lattice_size,
            geometry: LatticeGeometry::default(),
            channels: default_channels(),
            pairs: None,
            dt,
            nomega,
            omega_max: Some(omega_max),
            track_variance: false,
            preprocess: Preprocess::default(),
        }
    }

    /// Equal-time configuration: a single snapshot per sample, no energy axis.
    pub fn instant(lattice_size: [usize; 3]) -> Self {
        Self {
            nomega: 1,
            omega_max: None,
            ..Self::dynamical(lattice_size, 1.0, 1, std::f64::consts::PI)
        }
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(contents: &str) -> SqwResult<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|err| SqwError::serde("yaml-parse", err))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to YAML text.
    pub fn to_yaml_string(&self) -> SqwResult<String> {
        serde_yaml::to_string(self).map_err(|err| SqwError::serde("yaml-serialize", err))
    }

    /// Number of observable channels.
    pub fn nchannels(&self) -> usize {
        self.channels.len()
    }

    /// Requested pairs with the default (`i <= j`) expansion applied.
    pub fn resolved_pairs(&self) -> Vec<ChannelPair> {
        match &self.pairs {
            Some(pairs) => pairs.clone(),
            None => {
                let n = self.channels.len();
                (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect()
            }
        }
    }

    /// Checks everything that does not depend on the time-step arithmetic.
    ///
    /// The `Δt / ωmax / nω` combination is checked by [`crate::Grid::from_config`].
    pub fn validate(&self) -> SqwResult<()> {
        if self.lattice_size.iter().any(|&len| len == 0) {
            return Err(SqwError::Configuration(
                ErrorInfo::new("lattice-size", "every lattice dimension must be positive")
                    .with_context("lattice_size", format!("{:?}", self.lattice_size)),
            ));
        }
        if self.geometry.positions.is_empty() {
            return Err(config_error(
                "no-sublattices",
                "the unit cell must contain at least one sublattice",
            ));
        }
        if self.channels.is_empty() {
            return Err(config_error(
                "no-channels",
                "at least one observable channel is required",
            ));
        }
        for (idx, name) in self.channels.iter().enumerate() {
            if self.channels[..idx].contains(name) {
                return Err(SqwError::Configuration(
                    ErrorInfo::new("duplicate-channel", "channel names must be unique")
                        .with_context("channel", name.clone()),
                ));
            }
        }
        let pairs = self.resolved_pairs();
        if pairs.is_empty() {
            return Err(config_error(
                "no-pairs",
                "at least one channel pair must be accumulated",
            ));
        }
        let nchannels = self.channels.len();
        for (idx, &(a, b)) in pairs.iter().enumerate() {
            if a >= nchannels || b >= nchannels {
                return Err(SqwError::Configuration(
                    ErrorInfo::new("pair-out-of-range", "channel pair refers to an unknown channel")
                        .with_context("pair", format!("({a}, {b})"))
                        .with_context("channels", nchannels.to_string()),
                ));
            }
            if pairs[..idx].contains(&(a, b)) {
                return Err(SqwError::Configuration(
                    ErrorInfo::new("duplicate-pair", "channel pairs must be unique")
                        .with_context("pair", format!("({a}, {b})")),
                ));
            }
        }
        if self.nomega == 0 {
            return Err(config_error(
                "invalid-nomega",
                "nomega must be at least one (one selects equal-time correlations)",
            ));
        }
        Ok(())
    }
}
