#![deny(missing_docs)]
#![doc = "Core error types, schema descriptors and seeding helpers shared by the sqw crates."]

pub mod errors;
pub mod provenance;
pub mod rng;

pub use errors::{ErrorInfo, SqwError};
pub use provenance::SchemaVersion;
pub use rng::{derive_substream_seed, RngHandle};

/// Convenience alias used throughout the workspace.
pub type SqwResult<T> = Result<T, SqwError>;
