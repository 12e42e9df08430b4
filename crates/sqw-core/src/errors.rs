//! Structured error types shared across sqw crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SqwError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (shapes, indices, parameter values).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sqw engine.
///
/// Families are detected as early as possible: at accumulator construction,
/// at formula build time, or before the first tensor entry of a sample is
/// touched. An error surfacing from the middle of an accumulation would leave
/// the running statistics partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SqwError {
    /// Invalid construction parameters or a query the configuration cannot serve.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Sample buffer or partner accumulator incompatible with the fixed grid.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(ErrorInfo),
    /// Finite temperature that is not strictly positive.
    #[error("invalid temperature: {0}")]
    InvalidTemperature(ErrorInfo),
    /// Channel pair or channel that was never registered.
    #[error("lookup error: {0}")]
    Lookup(ErrorInfo),
    /// Serialization, checkpoint and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SqwError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SqwError::Configuration(info)
            | SqwError::ShapeMismatch(info)
            | SqwError::InvalidTemperature(info)
            | SqwError::Lookup(info)
            | SqwError::Serde(info) => info,
        }
    }

    /// Shorthand for a [`SqwError::Configuration`] with the given code.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        SqwError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SqwError::Serde`] with the given code.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        SqwError::Serde(ErrorInfo::new(code, err.to_string()))
    }
}
