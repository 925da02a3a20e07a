//! Failure reports handed to an [`ErrorReporter`](crate::traits::ErrorReporter).

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which part of the caching infrastructure failed.
///
/// Every kind is recovered by the engine; the caller's computation still
/// produces its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No usable key could be derived or the explicit key was rejected.
    KeyDerivation,
    /// The durable cache failed during lookup or store.
    DurableCache,
    /// The key already holds a transient value of another type.
    TransientTypeMismatch,
    /// The durable cache failed to clear.
    DurableClear,
}

impl FailureKind {
    /// Stable lowercase name, used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::KeyDerivation => "key_derivation",
            FailureKind::DurableCache => "durable_cache",
            FailureKind::TransientTypeMismatch => "transient_type_mismatch",
            FailureKind::DurableClear => "durable_clear",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context attached to a failure report.
#[derive(Clone, Copy, Debug)]
pub struct ErrorContext<'a> {
    /// What failed.
    pub kind: FailureKind,
    /// Name of the reporting engine.
    pub source: &'a str,
    /// Human-readable detail, usually the key involved.
    pub detail: &'a str,
    /// Underlying error, when there is one.
    pub cause: Option<&'a (dyn Error + 'static)>,
}

impl<'a> ErrorContext<'a> {
    /// Creates a context without a cause.
    pub fn new(kind: FailureKind, source: &'a str, detail: &'a str) -> Self {
        Self {
            kind,
            source,
            detail,
            cause: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_cause(mut self, cause: &'a (dyn Error + 'static)) -> Self {
        self.cause = Some(cause);
        self
    }
}
