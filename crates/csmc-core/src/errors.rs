//! Structured error types shared across the sampler crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CsmcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (indices, sizes, labels, etc.).
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

/// Canonical error type for the sampler.
///
/// `Input` and `Config` errors are detected before the first iteration and
/// leave no partial state behind. `Invariant` errors signal an engine defect or
/// an unmodelled numerical pathology and abort the run that raised them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CsmcError {
    /// Malformed or insufficient input sequences.
    #[error("input error: {0}")]
    Input(ErrorInfo),
    /// Broken engine invariant (bad index, negative branch, non-finite weight).
    #[error("invariant violation: {0}")]
    Invariant(ErrorInfo),
    /// Invalid run or model configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Randomness and sampling errors.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization and file system errors.
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

impl CsmcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CsmcError::Input(info)
            | CsmcError::Invariant(info)
            | CsmcError::Config(info)
            | CsmcError::Rng(info)
            | CsmcError::Serde(info) => info,
        }
    }

    /// Shorthand for an [`CsmcError::Invariant`] without context.
    pub fn invariant(code: &str, message: impl Into<String>) -> Self {
        CsmcError::Invariant(ErrorInfo::new(code, message))
    }

    /// Returns true when the error reports a broken engine invariant.
    pub fn is_invariant(&self) -> bool {
        matches!(self, CsmcError::Invariant(_))
    }
}
