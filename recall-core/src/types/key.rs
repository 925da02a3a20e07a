//! Computation keys.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RecallError, Result};

/// Identity of a memoized computation.
///
/// Either supplied explicitly by the caller or derived from the
/// computation's bound inputs. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComputationKey(String);

impl ComputationKey {
    /// Creates a key, rejecting empty or whitespace-only strings.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RecallError::InvalidKey("key cannot be empty".into()));
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ComputationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComputationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComputationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ComputationKey {
    type Error = RecallError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ComputationKey {
    type Error = RecallError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ComputationKey> for String {
    fn from(key: ComputationKey) -> Self {
        key.0
    }
}
