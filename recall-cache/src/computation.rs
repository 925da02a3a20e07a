//! Computations and their derived keys.

use std::any::type_name;
use std::fmt;
use std::hash::Hasher;
use std::panic::Location;

use rustc_hash::FxHasher;
use serde::Serialize;
use serde_json::Value;

use recall_core::constants::{KEY_DOMAIN_HI, KEY_DOMAIN_LO};
use recall_core::error::{RecallError, Result};
use recall_core::types::ComputationKey;

/// Identity material bound to a computation.
#[derive(Clone)]
enum BoundInputs {
    /// Nothing bound; the computation cannot be keyed automatically.
    Opaque,
    /// Canonical encoding of the bound inputs.
    Encoded(Vec<u8>),
    /// The inputs failed to encode; kept until key derivation reports it.
    Unencodable(String),
}

/// A zero-argument computation plus the inputs that identify it.
///
/// Closures cannot be inspected, so a computation that should be keyed
/// automatically declares its inputs with [`Computation::capturing`]. The
/// derived key covers the source location where the computation was built,
/// the closure's type, the optional label, and the encoded inputs, so it is
/// stable for equal inputs within one build of the program.
pub struct Computation<F> {
    func: F,
    inputs: BoundInputs,
    label: Option<String>,
    site: &'static Location<'static>,
}

impl<F> Computation<F> {
    /// Wraps a computation without bound inputs.
    ///
    /// Such a computation is only cached when the caller passes an explicit key.
    #[track_caller]
    pub fn new(func: F) -> Self {
        Self {
            func,
            inputs: BoundInputs::Opaque,
            label: None,
            site: Location::caller(),
        }
    }

    /// Wraps a computation identified by `inputs`.
    ///
    /// The inputs are encoded immediately; an encoding failure surfaces when
    /// the key is derived.
    ///
    /// Map entries are ordered by key before hashing, so a `HashMap` binds
    /// the same way regardless of its iteration order. Sequences keep their
    /// order: bind a `BTreeSet` or a sorted `Vec` rather than a `HashSet`.
    /// Map keys must serialize as strings or integers.
    #[track_caller]
    pub fn capturing<I: Serialize + ?Sized>(inputs: &I, func: F) -> Self {
        let inputs = match canonical_encoding(inputs) {
            Ok(encoded) => BoundInputs::Encoded(encoded),
            Err(e) => BoundInputs::Unencodable(e.to_string()),
        };
        Self {
            func,
            inputs,
            label: None,
            site: Location::caller(),
        }
    }

    /// Adds a label that separates computations binding equal inputs.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns true if inputs were bound and encoded successfully.
    pub fn has_bound_inputs(&self) -> bool {
        matches!(self.inputs, BoundInputs::Encoded(_))
    }

    /// Source location where the computation was built.
    pub fn site(&self) -> &'static Location<'static> {
        self.site
    }

    /// Derives the key from the call site, closure type, label, and bound inputs.
    ///
    /// The key is 32 hex characters: two domain-separated 64-bit FxHash
    /// digests. Not suitable where an adversary chooses the inputs.
    pub fn derive_key(&self) -> Result<ComputationKey> {
        let encoded = match &self.inputs {
            BoundInputs::Encoded(encoded) => encoded,
            BoundInputs::Opaque => return Err(RecallError::NoBoundInputs),
            BoundInputs::Unencodable(reason) => {
                return Err(RecallError::InputEncoding(reason.clone()))
            }
        };

        let site = format!("{}:{}:{}", self.site.file(), self.site.line(), self.site.column());
        let identity: [&[u8]; 4] = [
            site.as_bytes(),
            type_name::<F>().as_bytes(),
            self.label.as_deref().unwrap_or("").as_bytes(),
            encoded,
        ];
        let hi = digest(KEY_DOMAIN_HI, &identity);
        let lo = digest(KEY_DOMAIN_LO, &identity);

        ComputationKey::new(format!("{:016x}{:016x}", hi, lo))
    }

    pub(crate) fn into_func(self) -> F {
        self.func
    }
}

impl<T, E, F> Computation<F>
where
    F: FnOnce() -> std::result::Result<T, E>,
{
    /// Runs the computation directly, bypassing every cache.
    pub fn run(self) -> std::result::Result<T, E> {
        (self.func)()
    }
}

impl<F> fmt::Debug for Computation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = match &self.inputs {
            BoundInputs::Opaque => "opaque".to_string(),
            BoundInputs::Encoded(encoded) => format!("{} bytes", encoded.len()),
            BoundInputs::Unencodable(reason) => format!("unencodable ({})", reason),
        };
        f.debug_struct("Computation")
            .field("func", &type_name::<F>())
            .field("site", &self.site.to_string())
            .field("inputs", &inputs)
            .field("label", &self.label)
            .finish()
    }
}

/// Encodes `inputs` as JSON with every object's entries sorted by key.
fn canonical_encoding<I: Serialize + ?Sized>(inputs: &I) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&sort_objects(serde_json::to_value(inputs)?))
}

fn sort_objects(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_objects(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_objects).collect()),
        other => other,
    }
}

fn digest(domain: &[u8], identity: &[&[u8]]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(domain.len());
    hasher.write(domain);
    for part in identity {
        hasher.write_usize(part.len());
        hasher.write(part);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::convert::Infallible;

    use proptest::prelude::*;
    use recall_core::constants::DERIVED_KEY_HEX_LEN;
    use serde::Serializer;

    fn scaled(base: u64) -> Computation<impl FnOnce() -> std::result::Result<u64, Infallible>> {
        Computation::capturing(&base, move || Ok(base * 10))
    }

    fn tagged(inputs: &(u64, String)) -> Computation<impl FnOnce() -> std::result::Result<(), Infallible>> {
        Computation::capturing(inputs, || Ok(()))
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to encode"))
        }
    }

    #[test]
    fn test_key_is_deterministic() {
        let first = scaled(7).derive_key().unwrap();
        let second = scaled(7).derive_key().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), DERIVED_KEY_HEX_LEN);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_differs_by_inputs() {
        let a = scaled(1).derive_key().unwrap();
        let b = scaled(2).derive_key().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_differs_by_label() {
        let plain = scaled(3).derive_key().unwrap();
        let labelled = scaled(3).named("scaled").derive_key().unwrap();
        assert_ne!(plain, labelled);
        assert_eq!(scaled(3).named("scaled").label(), Some("scaled"));
    }

    #[test]
    fn test_key_differs_by_closure() {
        let base = 3u64;
        let times_ten = Computation::capturing(&base, move || Ok::<_, Infallible>(base * 10));
        let times_two = Computation::capturing(&base, move || Ok::<_, Infallible>(base * 2));
        assert_ne!(times_ten.derive_key().unwrap(), times_two.derive_key().unwrap());
    }

    #[test]
    fn test_opaque_has_no_key() {
        let computation = Computation::new(|| Ok::<_, Infallible>(1));
        assert!(!computation.has_bound_inputs());
        assert!(matches!(computation.derive_key(), Err(RecallError::NoBoundInputs)));
        assert_eq!(computation.run(), Ok(1));
    }

    #[test]
    fn test_unencodable_inputs() {
        let computation = Computation::capturing(&Unencodable, || Ok::<_, Infallible>(1));
        assert!(!computation.has_bound_inputs());
        match computation.derive_key() {
            Err(RecallError::InputEncoding(reason)) => assert!(reason.contains("refusing")),
            other => panic!("expected encoding failure, got {:?}", other),
        }
    }

    #[test]
    fn test_key_differs_by_call_site() {
        let base = 3u64;
        let first = Computation::capturing(&base, move || Ok::<_, Infallible>(base));
        let second = Computation::capturing(&base, move || Ok::<_, Infallible>(base));
        assert_ne!(first.site(), second.site());
        assert_ne!(first.derive_key().unwrap(), second.derive_key().unwrap());
    }

    #[test]
    fn test_hash_map_inputs_are_order_independent() {
        let build = || -> HashMap<String, u32> {
            (0..16).map(|i| (format!("region-{}", i), i * 7)).collect()
        };
        let keyed = |inputs: &HashMap<String, u32>| {
            Computation::capturing(inputs, || Ok::<_, Infallible>(())).derive_key().unwrap()
        };

        let keys: HashSet<ComputationKey> = (0..20).map(|_| keyed(&build())).collect();
        assert_eq!(keys.len(), 1);

        let mut changed = build();
        changed.insert("region-0".into(), 1);
        assert!(!keys.contains(&keyed(&changed)));
    }

    #[test]
    fn test_nested_struct_inputs_are_order_independent() {
        #[derive(Serialize)]
        struct Query {
            table: String,
            filters: HashMap<u32, Vec<String>>,
        }

        let build = || Query {
            table: "orders".into(),
            filters: (0..8).map(|i| (i, vec![format!("v{}", i), "x".into()])).collect(),
        };
        let keyed = |query: &Query| {
            Computation::capturing(query, || Ok::<_, Infallible>(())).derive_key().unwrap()
        };

        let first = keyed(&build());
        for _ in 0..10 {
            assert_eq!(keyed(&build()), first);
        }
    }

    #[test]
    fn test_sequence_order_is_significant() {
        let keyed = |inputs: &Vec<u32>| {
            Computation::capturing(inputs, || Ok::<_, Infallible>(())).derive_key().unwrap()
        };
        assert_ne!(keyed(&vec![1, 2]), keyed(&vec![2, 1]));
    }

    #[test]
    fn test_non_string_map_keys_are_unencodable() {
        let inputs: HashMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let computation = Computation::capturing(&inputs, || Ok::<_, Infallible>(()));
        assert!(matches!(computation.derive_key(), Err(RecallError::InputEncoding(_))));
    }

    #[test]
    fn test_debug_output() {
        let rendered = format!("{:?}", scaled(1).named("x"));
        assert!(rendered.contains("1 bytes"));
        assert!(rendered.contains("computation.rs"));
        assert!(rendered.contains("\"x\""));
    }

    proptest! {
        #[test]
        fn prop_equal_inputs_equal_keys(n in any::<u64>(), s in ".*") {
            let inputs = (n, s);
            let first = tagged(&inputs).derive_key().unwrap();
            let second = tagged(&inputs.clone()).derive_key().unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_distinct_inputs_distinct_keys(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            prop_assert_ne!(scaled(a).derive_key().unwrap(), scaled(b).derive_key().unwrap());
        }
    }
}
