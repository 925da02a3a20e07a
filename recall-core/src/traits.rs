//! Collaborator traits for RECALL.
//!
//! The engine owns its process-local tier; everything durable or
//! observational is injected through these seams.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{ComputationKey, ErrorContext};

// ═══════════════════════════════════════════════════════════════════════════════
// DURABLE CACHE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Callback a durable cache invokes on a miss to produce the encoded value.
///
/// Errors returned by the callback must be propagated unchanged.
pub type ComputeFn<'a> = dyn FnMut() -> Result<Vec<u8>> + 'a;

/// Interface for an expiring, shared cache behind the engine.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - Files on local disk (survives restarts)
/// - A networked key-value store
pub trait DurableCache: Send + Sync {
    /// Returns the value stored under `key` if present and unexpired.
    ///
    /// Otherwise invokes `compute`, stores its output so that it expires
    /// `ttl` from now, and returns it. Any error from `compute` is returned
    /// as-is and nothing is stored.
    ///
    /// A panic raised by `compute` should be left to unwind. If an
    /// implementation catches it instead, the engine resumes unwinding once
    /// the call returns.
    fn get_or_compute(
        &self,
        key: &ComputationKey,
        ttl: Duration,
        compute: &mut ComputeFn<'_>,
    ) -> Result<Vec<u8>>;

    /// Removes every stored value.
    fn clear(&self) -> Result<()>;
}

impl<T: DurableCache + ?Sized> DurableCache for Arc<T> {
    fn get_or_compute(
        &self,
        key: &ComputationKey,
        ttl: Duration,
        compute: &mut ComputeFn<'_>,
    ) -> Result<Vec<u8>> {
        (**self).get_or_compute(key, ttl, compute)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR REPORTER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Sink for recovered infrastructure failures.
pub trait ErrorReporter: Send + Sync {
    /// Records a failure the engine recovered from.
    fn report_error(&self, message: &str, context: &ErrorContext<'_>);
}

impl<T: ErrorReporter + ?Sized> ErrorReporter for Arc<T> {
    fn report_error(&self, message: &str, context: &ErrorContext<'_>) {
        (**self).report_error(message, context)
    }
}
