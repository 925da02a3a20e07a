//! Domain types for RECALL.
//!
//! - [`ComputationKey`]: Identity of a memoized computation
//! - [`Ttl`]: Tier routing and durable expiry
//! - [`ErrorContext`]: Structured context attached to failure reports

mod key;
mod report;
mod ttl;

pub use key::*;
pub use report::*;
pub use ttl::*;
