use num_complex::Complex64;
use sha2::{Digest, Sha256};
use sqw_core::{SchemaVersion, SqwError, SqwResult};

use crate::config::CorrelationConfig;

/// Canonical SHA-256 digest of an accumulated tensor and its metadata.
pub fn tensor_hash(
    schema: &SchemaVersion,
    config: &CorrelationConfig,
    nsamples: u64,
    mean: &[Complex64],
    second_moment: Option<&[f64]>,
) -> SqwResult<String> {
    let config_json =
        serde_json::to_vec(config).map_err(|err| SqwError::serde("hash-serialize", err))?;
    let mut hasher = Sha256::new();
    hasher.update((schema.major as u64).to_le_bytes());
    hasher.update((schema.minor as u64).to_le_bytes());
    hasher.update((schema.patch as u64).to_le_bytes());
    hasher.update((config_json.len() as u64).to_le_bytes());
    hasher.update(&config_json);
    hasher.update(nsamples.to_le_bytes());
    hasher.update((mean.len() as u64).to_le_bytes());
    for value in mean {
        hasher.update(value.re.to_le_bytes());
        hasher.update(value.im.to_le_bytes());
    }
    match second_moment {
        Some(m2) => {
            hasher.update([1u8]);
            for value in m2 {
                hasher.update(value.to_le_bytes());
            }
        }
        None => hasher.update([0u8]),
    }
    Ok(format!("{:x}", hasher.finalize()))
}
