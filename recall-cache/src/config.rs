//! Engine configuration.

use serde::{Deserialize, Serialize};

use recall_core::constants::{DEFAULT_ENGINE_NAME, ENV_DEFAULT_TTL, ENV_ENGINE_NAME};
use recall_core::error::{RecallError, Result};
use recall_core::types::Ttl;

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name the engine uses as the source of its failure reports
    pub name: String,
    /// Ttl applied by [`MemoEngine::memoize`](crate::MemoEngine::memoize)
    pub default_ttl: Ttl,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ENGINE_NAME.into(),
            default_ttl: Ttl::Ephemeral,
        }
    }
}

impl EngineConfig {
    /// Reads `RECALL_ENGINE_NAME` and `RECALL_DEFAULT_TTL`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_ENGINE_NAME) {
            config = config.with_name(name)?;
        }
        if let Some(ttl) = lookup(ENV_DEFAULT_TTL) {
            config.default_ttl = ttl.parse().map_err(|e| {
                RecallError::ConfigError(format!("{}: {}", ENV_DEFAULT_TTL, e))
            })?;
        }

        Ok(config)
    }

    /// Sets the engine name.
    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecallError::ConfigError("engine name cannot be empty".into()));
        }
        self.name = name;
        Ok(self)
    }

    /// Sets the default ttl.
    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }
}
