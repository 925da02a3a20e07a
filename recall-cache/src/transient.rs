//! Process-local memo tier.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use recall_core::types::ComputationKey;

/// A memoized value and the name of its type.
struct StoredValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// One key's cell.
///
/// `value` stays locked while the value is being computed, so concurrent
/// callers for the same key wait for the first result instead of computing
/// their own.
#[derive(Default)]
struct Slot {
    value: Mutex<Option<StoredValue>>,
    filled: AtomicBool,
    hits: AtomicU64,
}

/// Result of a transient lookup.
pub(crate) enum Lookup<T, E, F> {
    /// Served from the tier.
    Hit(T),
    /// The computation ran; a successful result was stored.
    Computed(Result<T, E>),
    /// The key holds a value of another type. The computation was not run.
    TypeMismatch { stored: &'static str, func: F },
}

/// Snapshot of the transient tier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransientStats {
    /// Keys holding a value.
    pub entries: usize,
    /// Keys without a value: being computed, or their last computation failed.
    pub pending: usize,
    /// Sum of hit counts over all stored values.
    pub total_hits: u64,
}

/// Unbounded map from key to memoized value. Entries never expire.
#[derive(Default)]
pub(crate) struct TransientTier {
    slots: Mutex<HashMap<ComputationKey, Arc<Slot>>>,
}

impl TransientTier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value for `key`, or runs `func` and stores its
    /// successful result with a hit count of zero.
    ///
    /// `func` must not call back into this tier with the same key.
    pub(crate) fn get_or_compute<T, E, F>(&self, key: &ComputationKey, func: F) -> Lookup<T, E, F>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(key);
        let mut value = slot.value.lock();

        if let Some(stored) = value.as_ref() {
            return match stored.value.downcast_ref::<T>() {
                Some(hit) => {
                    slot.hits.fetch_add(1, Ordering::Relaxed);
                    Lookup::Hit(hit.clone())
                }
                None => Lookup::TypeMismatch {
                    stored: stored.type_name,
                    func,
                },
            };
        }

        let result = func();
        if let Ok(computed) = &result {
            *value = Some(StoredValue {
                value: Box::new(computed.clone()),
                type_name: type_name::<T>(),
            });
            slot.hits.store(0, Ordering::Relaxed);
            slot.filled.store(true, Ordering::Release);
        }
        Lookup::Computed(result)
    }

    /// Hit count of the value stored under `key`, if any.
    pub(crate) fn hit_count(&self, key: &str) -> Option<u64> {
        let slots = self.slots.lock();
        slots
            .get(key)
            .filter(|slot| slot.filled.load(Ordering::Acquire))
            .map(|slot| slot.hits.load(Ordering::Relaxed))
    }

    /// Drops every slot.
    ///
    /// A computation still running keeps its own slot alive and stores into
    /// it, but later lookups start from a fresh slot.
    pub(crate) fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let count = slots.len();
        slots.clear();
        count
    }

    pub(crate) fn stats(&self) -> TransientStats {
        let slots = self.slots.lock();
        let mut stats = TransientStats::default();
        for slot in slots.values() {
            if slot.filled.load(Ordering::Acquire) {
                stats.entries += 1;
                stats.total_hits += slot.hits.load(Ordering::Relaxed);
            } else {
                stats.pending += 1;
            }
        }
        stats
    }

    fn slot(&self, key: &ComputationKey) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}
