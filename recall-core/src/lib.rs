//! # RECALL Core
//!
//! Core types, errors, and collaborator traits for the RECALL memoization engine.
//!
//! This crate provides the foundational building blocks used by all other RECALL crates:
//!
//! - **Types**: Computation keys, time-to-live routing, failure reports
//! - **Errors**: Infrastructure error type with classification helpers
//! - **Constants**: Key derivation domains, defaults, and environment variable names
//! - **Traits**: The durable cache and error reporter seams
//!
//! ## Example
//!
//! ```rust
//! use recall_core::{ComputationKey, Ttl};
//!
//! let key = ComputationKey::new("report:2024-q1").unwrap();
//! let ttl: Ttl = "60".parse().unwrap();
//! assert_eq!(key.as_str(), "report:2024-q1");
//! assert!(ttl.is_durable());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{RecallError, Result};
pub use traits::*;
pub use types::*;
