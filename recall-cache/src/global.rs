//! Process-wide engine.
//!
//! Prefer constructing a [`MemoEngine`] at startup and passing an
//! `Arc<MemoEngine>` to the code that needs it. This module serves call
//! sites that cannot take the engine as a parameter. It is process-wide
//! mutable state: the engine lives until [`reset`] or [`install`] replaces it
//! and the last `Arc` is dropped.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use recall_core::types::Ttl;

use crate::computation::Computation;
use crate::engine::{MemoEngine, Memoizable};

static INSTANCE: Lazy<RwLock<Option<Arc<MemoEngine>>>> = Lazy::new(|| RwLock::new(None));

/// Returns the process-wide engine, creating a default one on first use.
///
/// The default engine has no durable cache and no error reporter.
pub fn instance() -> Arc<MemoEngine> {
    {
        let current = INSTANCE.read();
        if let Some(engine) = current.as_ref() {
            return Arc::clone(engine);
        }
    }

    let mut current = INSTANCE.write();
    Arc::clone(current.get_or_insert_with(|| {
        debug!("Creating default process-wide engine");
        Arc::new(MemoEngine::new())
    }))
}

/// Installs `engine` as the process-wide engine, returning the previous one.
pub fn install(engine: MemoEngine) -> Option<Arc<MemoEngine>> {
    INSTANCE.write().replace(Arc::new(engine))
}

/// Removes the process-wide engine. The next [`instance`] call creates a fresh default.
pub fn reset() -> Option<Arc<MemoEngine>> {
    INSTANCE.write().take()
}

/// [`MemoEngine::cache`] on the process-wide engine.
pub fn cache<T, E, F>(computation: Computation<F>, key: Option<&str>, ttl: Ttl) -> Result<T, E>
where
    T: Memoizable,
    F: FnOnce() -> Result<T, E>,
{
    instance().cache(computation, key, ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serial_test::serial;

    use crate::config::EngineConfig;

    #[test]
    #[serial]
    fn test_instance_is_lazy_and_shared() {
        reset();
        let first = instance();
        let second = instance();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "recall");
        assert!(!first.has_durable());
    }

    #[test]
    #[serial]
    fn test_install_replaces_instance() {
        reset();
        let default = instance();

        let config = EngineConfig::default().with_name("installed").unwrap();
        let previous = install(MemoEngine::with_config(config));

        assert!(Arc::ptr_eq(&previous.unwrap(), &default));
        assert_eq!(instance().name(), "installed");
        assert_eq!(MemoEngine::instance().name(), "installed");
        reset();
    }

    #[test]
    #[serial]
    fn test_global_cache_memoizes() {
        reset();
        let calls = AtomicUsize::new(0);
        let compute = |n: u32| {
            let calls = &calls;
            Computation::capturing(&n, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(n + 1)
            })
        };

        assert_eq!(cache(compute(1), None, Ttl::Ephemeral), Ok(2));
        assert_eq!(cache(compute(1), None, Ttl::Ephemeral), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        reset();
        assert_eq!(cache(compute(1), None, Ttl::Ephemeral), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
