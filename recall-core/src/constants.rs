//! Constants shared across RECALL crates.

// ═══════════════════════════════════════════════════════════════════════════════
// KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain separator for the high half of a derived key.
pub const KEY_DOMAIN_HI: &[u8] = b"RECALL_KEY_V2_HI";

/// Domain separator for the low half of a derived key.
pub const KEY_DOMAIN_LO: &[u8] = b"RECALL_KEY_V2_LO";

/// Length in hex characters of a derived key (two 64-bit digests).
pub const DERIVED_KEY_HEX_LEN: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Name an engine reports itself as when none is configured.
pub const DEFAULT_ENGINE_NAME: &str = "recall";

/// Spelling of the ephemeral time-to-live in configuration and on the command line.
pub const EPHEMERAL_TTL_NAME: &str = "ephemeral";

// ═══════════════════════════════════════════════════════════════════════════════
// STORE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default capacity of the in-memory durable store.
pub const DEFAULT_STORE_MAX_ENTRIES: usize = 10_000;

/// Extension of entry documents written by the file store.
pub const STORE_FILE_EXTENSION: &str = "json";

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Overrides the engine name used in failure reports.
pub const ENV_ENGINE_NAME: &str = "RECALL_ENGINE_NAME";

/// Overrides the default time-to-live (`ephemeral` or seconds).
pub const ENV_DEFAULT_TTL: &str = "RECALL_DEFAULT_TTL";

/// Directory of the file store used by the CLI.
pub const ENV_STORE_DIR: &str = "RECALL_STORE_DIR";
