use std::fs;
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sqw_core::{ErrorInfo, SchemaVersion, SqwError, SqwResult};
use tracing::info;

use crate::accumulator::CorrelationAccumulator;
use crate::config::CorrelationConfig;
use crate::hash::tensor_hash;

/// Schema written by this version of the crate.
pub const CHECKPOINT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

fn io_error(code: &str, err: impl ToString, path: &Path) -> SqwError {
    SqwError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Serializable snapshot of an accumulator.
///
/// The grid and FFT plan are rebuilt from `config` on restore; the content
/// hash guards the tensors against truncated or edited files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorCheckpoint {
    /// Schema version of the payload.
    pub schema_version: SchemaVersion,
    /// Construction parameters of the accumulator.
    pub config: CorrelationConfig,
    /// Number of accumulated samples.
    pub nsamples: u64,
    /// Running mean tensor.
    pub mean: Vec<Complex64>,
    /// Running second-moment tensor, present iff variance is tracked.
    #[serde(default)]
    pub second_moment: Option<Vec<f64>>,
    /// SHA-256 digest over all of the above.
    pub content_hash: String,
}

impl AccumulatorCheckpoint {
    /// Captures the current state of an accumulator.
    pub fn capture(accumulator: &CorrelationAccumulator) -> SqwResult<Self> {
        let content_hash = tensor_hash(
            &CHECKPOINT_SCHEMA,
            accumulator.config(),
            accumulator.nsamples(),
            accumulator.mean_tensor(),
            accumulator.second_moment_tensor(),
        )?;
        Ok(Self {
            schema_version: CHECKPOINT_SCHEMA,
            config: accumulator.config().clone(),
            nsamples: accumulator.nsamples(),
            mean: accumulator.mean_tensor().to_vec(),
            second_moment: accumulator.second_moment_tensor().map(<[f64]>::to_vec),
            content_hash,
        })
    }

    /// Verifies schema and hash, then rebuilds the accumulator.
    pub fn restore(self) -> SqwResult<CorrelationAccumulator> {
        if !CHECKPOINT_SCHEMA.reads(&self.schema_version) {
            return Err(SqwError::Serde(
                ErrorInfo::new("checkpoint-schema", "unsupported checkpoint schema")
                    .with_context("found", format!("{:?}", self.schema_version))
                    .with_context("supported", format!("{:?}", CHECKPOINT_SCHEMA)),
            ));
        }
        let expected = tensor_hash(
            &self.schema_version,
            &self.config,
            self.nsamples,
            &self.mean,
            self.second_moment.as_deref(),
        )?;
        if expected != self.content_hash {
            return Err(SqwError::Serde(
                ErrorInfo::new("checkpoint-hash", "checkpoint content hash mismatch")
                    .with_context("expected", expected)
                    .with_context("stored", self.content_hash),
            ));
        }
        let Self { config, nsamples, mean, second_moment, .. } = self;
        CorrelationAccumulator::from_parts(config, nsamples, mean, second_moment)
    }

    /// Pretty JSON encoding.
    pub fn to_json(&self) -> SqwResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| SqwError::serde("json-serialize", err))
    }

    /// Decodes a JSON payload.
    pub fn from_json(data: &str) -> SqwResult<Self> {
        serde_json::from_str(data).map_err(|err| SqwError::serde("json-deserialize", err))
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> SqwResult<Vec<u8>> {
        bincode::serialize(self).map_err(|err| SqwError::serde("bincode-serialize", err))
    }

    /// Decodes a binary payload.
    pub fn from_bytes(bytes: &[u8]) -> SqwResult<Self> {
        bincode::deserialize(bytes).map_err(|err| SqwError::serde("bincode-deserialize", err))
    }

    /// Writes the binary encoding to `path`, creating parent directories.
    pub fn store(&self, path: &Path) -> SqwResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("checkpoint-mkdir", err, parent))?;
        }
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|err| io_error("checkpoint-write", err, path))?;
        info!(path = %path.display(), nsamples = self.nsamples, "stored checkpoint");
        Ok(())
    }

    /// Reads a binary checkpoint from `path`.
    pub fn load(path: &Path) -> SqwResult<Self> {
        let bytes = fs::read(path).map_err(|err| io_error("checkpoint-read", err, path))?;
        let checkpoint = Self::from_bytes(&bytes)?;
        info!(path = %path.display(), nsamples = checkpoint.nsamples, "loaded checkpoint");
        Ok(checkpoint)
    }
}

impl CorrelationAccumulator {
    /// Shorthand for [`AccumulatorCheckpoint::capture`].
    pub fn checkpoint(&self) -> SqwResult<AccumulatorCheckpoint> {
        AccumulatorCheckpoint::capture(self)
    }
}
