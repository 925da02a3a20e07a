//! # RECALL Store
//!
//! Durable cache backends for the RECALL memoization engine.
//!
//! This crate provides two backends implementing [`DurableCache`]:
//!
//! - **Memory**: Expiring in-process map for development and testing
//! - **File**: One JSON document per key, for values that must outlive the process
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recall_store::FileStore;
//!
//! let store = Arc::new(FileStore::open("/var/cache/myapp")?);
//! let engine = MemoEngine::new().with_durable(store);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;

pub use file::{FileEntry, FileStore};
pub use memory::{MemoryStore, StoreConfig, StoreStats};

// Re-export the trait from core
pub use recall_core::traits::DurableCache;
