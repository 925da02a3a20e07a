//! The memoization engine.

use std::any::type_name;
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn, Level};

use recall_core::error::RecallError;
use recall_core::traits::{DurableCache, ErrorReporter};
use recall_core::types::{ComputationKey, ErrorContext, FailureKind, Ttl};

use crate::computation::Computation;
use crate::config::EngineConfig;
use crate::global;
use crate::transient::{Lookup, TransientStats, TransientTier};

/// Values the engine can memoize in either tier.
///
/// Durable values cross the [`DurableCache`] boundary as JSON.
pub trait Memoizable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Memoizable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Memoization engine.
///
/// Owns the process-local tier and optionally shares a durable cache and an
/// error reporter with the rest of the application. Thread-safe; wrap it in
/// an `Arc` to share it.
///
/// # Routing
///
/// | ttl            | durable cache | tier                         |
/// |----------------|---------------|------------------------------|
/// | `Ephemeral`    | any           | process-local                |
/// | `Seconds(n)`   | none          | process-local                |
/// | `Seconds(n)`   | configured    | durable, expiring after `n`s |
pub struct MemoEngine {
    config: EngineConfig,
    transient: TransientTier,
    durable: Option<Arc<dyn DurableCache>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl MemoEngine {
    /// Creates an engine with default configuration, no durable cache and no reporter.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            transient: TransientTier::new(),
            durable: None,
            reporter: None,
        }
    }

    /// Attaches a durable cache.
    pub fn with_durable(mut self, durable: Arc<dyn DurableCache>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Attaches an error reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Returns the process-wide engine. See [`global::instance`].
    pub fn instance() -> Arc<MemoEngine> {
        global::instance()
    }

    /// Returns the engine name used in failure reports.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns true if a durable cache is attached.
    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Returns the memoized value for `computation`, computing it if needed.
    ///
    /// `key` overrides key derivation. Without it the key is derived from the
    /// computation's bound inputs; if that fails the computation runs
    /// uncached. An empty explicit key is treated the same way.
    ///
    /// Errors returned by the computation are passed through unchanged and
    /// never cached. Failures of the caching infrastructure are reported and
    /// never returned.
    pub fn cache<T, E, F>(&self, computation: Computation<F>, key: Option<&str>, ttl: Ttl) -> Result<T, E>
    where
        T: Memoizable,
        F: FnOnce() -> Result<T, E>,
    {
        let key = match key {
            Some(explicit) => match ComputationKey::new(explicit) {
                Ok(key) => key,
                Err(err) => {
                    self.report(
                        FailureKind::KeyDerivation,
                        "Rejected explicit cache key; running uncached",
                        explicit,
                        Some(&err),
                    );
                    return computation.run();
                }
            },
            None => match self.derive_key(&computation) {
                Some(key) => key,
                None => return computation.run(),
            },
        };

        match (ttl.duration(), &self.durable) {
            (Some(ttl), Some(durable)) => {
                self.cache_durable(durable.as_ref(), key, ttl, computation.into_func())
            }
            _ => self.cache_transient(key, computation.into_func()),
        }
    }

    /// [`cache`](Self::cache) with a derived key and the configured default ttl.
    pub fn memoize<T, E, F>(&self, computation: Computation<F>) -> Result<T, E>
    where
        T: Memoizable,
        F: FnOnce() -> Result<T, E>,
    {
        self.cache(computation, None, self.config.default_ttl)
    }

    /// [`cache`](Self::cache) for a bare closure under an explicit key.
    pub fn cache_keyed<T, E, F>(&self, key: &str, ttl: Ttl, func: F) -> Result<T, E>
    where
        T: Memoizable,
        F: FnOnce() -> Result<T, E>,
    {
        self.cache(Computation::new(func), Some(key), ttl)
    }

    /// Derives the key for `computation`.
    ///
    /// Returns `None` after reporting the failure when no key can be derived,
    /// which means "do not cache".
    pub fn derive_key<F>(&self, computation: &Computation<F>) -> Option<ComputationKey> {
        match computation.derive_key() {
            Ok(key) => Some(key),
            Err(err) => {
                self.report(
                    FailureKind::KeyDerivation,
                    "Could not derive a cache key; running uncached",
                    computation.label().unwrap_or(type_name::<F>()),
                    Some(&err),
                );
                None
            }
        }
    }

    /// Empties the process-local tier. The durable cache is untouched.
    pub fn clear_transient_cache(&self) -> &Self {
        let dropped = self.transient.clear();
        debug!(engine = %self.config.name, dropped, "Cleared transient cache");
        self
    }

    /// Clears the durable cache, if one is attached.
    ///
    /// A failure is reported, not returned.
    pub fn clear_durable_cache(&self) -> &Self {
        if let Some(durable) = &self.durable {
            match durable.clear() {
                Ok(()) => debug!(engine = %self.config.name, "Cleared durable cache"),
                Err(err) => self.report(
                    FailureKind::DurableClear,
                    "Failed to clear durable cache",
                    "clear",
                    Some(&err),
                ),
            }
        }
        self
    }

    /// Hit count of the process-local value stored under `key`, if any.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.transient.hit_count(key)
    }

    /// Returns a snapshot of the process-local tier.
    pub fn transient_stats(&self) -> TransientStats {
        self.transient.stats()
    }

    fn cache_transient<T, E, F>(&self, key: ComputationKey, func: F) -> Result<T, E>
    where
        T: Memoizable,
        F: FnOnce() -> Result<T, E>,
    {
        match self.transient.get_or_compute(&key, func) {
            Lookup::Hit(value) => {
                debug!(key = %key, "Transient hit");
                Ok(value)
            }
            Lookup::Computed(result) => {
                debug!(key = %key, ok = result.is_ok(), "Transient miss, computed");
                result
            }
            Lookup::TypeMismatch { stored, func } => {
                let err = RecallError::TypeMismatch {
                    key: key.to_string(),
                    stored,
                    requested: type_name::<T>(),
                };
                self.report(
                    FailureKind::TransientTypeMismatch,
                    "Cached value has a different type; running uncached",
                    key.as_str(),
                    Some(&err),
                );
                func()
            }
        }
    }

    fn cache_durable<T, E, F>(
        &self,
        durable: &dyn DurableCache,
        key: ComputationKey,
        ttl: Duration,
        func: F,
    ) -> Result<T, E>
    where
        T: Memoizable,
        F: FnOnce() -> Result<T, E>,
    {
        // `outcome` is set whenever `func` is taken, so the fallback below
        // never runs a computation twice.
        let mut func = Some(func);
        let mut outcome: Option<Result<T, E>> = None;

        let stored = durable.get_or_compute(&key, ttl, &mut || {
            let func = func.take().ok_or(RecallError::ComputationConsumed)?;
            match func() {
                Ok(value) => {
                    let encoded = serde_json::to_vec(&value);
                    outcome = Some(Ok(value));
                    Ok(encoded?)
                }
                Err(err) => {
                    outcome = Some(Err(err));
                    Err(RecallError::ComputationFailed)
                }
            }
        });

        let failure = match (stored, outcome) {
            (_, Some(Err(err))) => return Err(err),
            (Ok(_), Some(Ok(value))) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Durable miss, computed");
                return Ok(value);
            }
            (Ok(bytes), None) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(key = %key, "Durable hit");
                    return Ok(value);
                }
                Err(err) => RecallError::CorruptEntry {
                    key: key.to_string(),
                    reason: err.to_string(),
                },
            },
            (Err(err), Some(Ok(value))) => {
                self.report_durable_failure(&key, &err);
                return Ok(value);
            }
            (Err(err), None) => err,
        };

        self.report_durable_failure(&key, &failure);
        match func {
            Some(func) => func(),
            // The computation was taken but never finished: the durable cache
            // caught its panic. Keep unwinding rather than run it again.
            None => panic::resume_unwind(Box::new(format!(
                "computation for key '{}' did not complete inside the durable cache",
                key
            ))),
        }
    }

    fn report_durable_failure(&self, key: &ComputationKey, err: &RecallError) {
        self.report(
            FailureKind::DurableCache,
            "Durable cache failed; serving uncached result",
            key.as_str(),
            Some(err),
        );
    }

    /// Level of the engine's own log line for a recovered failure.
    ///
    /// An attached reporter owns the failure, so the engine only traces it.
    fn failure_log_level(&self) -> Level {
        if self.reporter.is_some() {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }

    fn report(&self, kind: FailureKind, message: &str, detail: &str, cause: Option<&RecallError>) {
        let cause_text = cause.map(ToString::to_string).unwrap_or_default();
        if self.failure_log_level() == Level::WARN {
            warn!(engine = %self.config.name, kind = %kind, detail, error = %cause_text, "{}", message);
        } else {
            debug!(engine = %self.config.name, kind = %kind, detail, error = %cause_text, "{}", message);
        }

        if let Some(reporter) = &self.reporter {
            let mut context = ErrorContext::new(kind, &self.config.name, detail);
            if let Some(cause) = cause {
                context = context.with_cause(cause);
            }
            reporter.report_error(message, &context);
        }
    }
}

impl Default for MemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoEngine")
            .field("config", &self.config)
            .field("durable", &self.durable.is_some())
            .field("reporter", &self.reporter.is_some())
            .field("transient", &self.transient.stats())
            .finish()
    }
}
