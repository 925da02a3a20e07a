//! # RECALL Cache
//!
//! Memoization engine with a process-local tier and an optional durable tier.
//!
//! A call to [`MemoEngine::cache`] resolves a key (explicit, or derived from
//! the computation's bound inputs), then:
//!
//! - with [`Ttl::Ephemeral`] or no durable cache configured, serves the value
//!   from the process-local tier, computing it at most once per key;
//! - otherwise delegates to the configured [`DurableCache`], falling back to
//!   running the computation directly if the durable cache fails.
//!
//! Infrastructure failures are reported and recovered. Errors returned by the
//! computation itself always reach the caller unchanged.
//!
//! ## Example
//!
//! ```rust
//! use std::convert::Infallible;
//! use recall_cache::{Computation, MemoEngine, Ttl};
//!
//! let engine = MemoEngine::new();
//! let base = 21u64;
//!
//! let value: Result<u64, Infallible> =
//!     engine.cache(Computation::capturing(&base, || Ok(base * 2)), None, Ttl::Ephemeral);
//! assert_eq!(value, Ok(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod computation;
mod config;
mod engine;
pub mod global;
mod reporter;
mod transient;

pub use computation::Computation;
pub use config::EngineConfig;
pub use engine::{MemoEngine, Memoizable};
pub use reporter::TracingReporter;
pub use transient::TransientStats;

// Re-export the types callers need at every call site
pub use recall_core::traits::{DurableCache, ErrorReporter};
pub use recall_core::types::{ComputationKey, ErrorContext, FailureKind, Ttl};
