//! Time-to-live routing.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::EPHEMERAL_TTL_NAME;
use crate::error::{RecallError, Result};

/// Requested lifetime of a memoized result.
///
/// `Ephemeral` keeps the result in the process-local tier only. `Seconds`
/// asks for durable persistence that expires after the given number of
/// seconds; it falls back to the process-local tier when no durable cache is
/// configured.
///
/// Serialized as the string `"ephemeral"` or a number of seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TtlRepr", into = "TtlRepr")]
pub enum Ttl {
    /// No durable persistence requested.
    #[default]
    Ephemeral,
    /// Durable persistence for this many seconds.
    Seconds(u64),
}

impl Ttl {
    /// Durable lifetime of `secs` seconds.
    pub const fn seconds(secs: u64) -> Self {
        Ttl::Seconds(secs)
    }

    /// Returns true if this ttl requests durable persistence.
    pub fn is_durable(&self) -> bool {
        matches!(self, Ttl::Seconds(_))
    }

    /// Returns the durable lifetime, or `None` for `Ephemeral`.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Ephemeral => None,
            Ttl::Seconds(secs) => Some(Duration::from_secs(*secs)),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Seconds(duration.as_secs())
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Ephemeral => f.write_str(EPHEMERAL_TTL_NAME),
            Ttl::Seconds(secs) => write!(f, "{}s", secs),
        }
    }
}

impl FromStr for Ttl {
    type Err = RecallError;

    /// Parses `"ephemeral"` (any case) or a positive number of seconds,
    /// optionally suffixed with `s`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(EPHEMERAL_TTL_NAME) {
            return Ok(Ttl::Ephemeral);
        }

        let digits = s.strip_suffix('s').unwrap_or(s);
        let secs: u64 = digits
            .parse()
            .map_err(|_| RecallError::ConfigError(format!("invalid ttl '{}'", s)))?;
        durable(secs)
    }
}

/// Parsed and deserialized lifetimes share this check.
fn durable(secs: u64) -> Result<Ttl> {
    if secs == 0 {
        return Err(RecallError::ConfigError(
            "ttl must be at least one second; use 'ephemeral' to skip the durable tier".into(),
        ));
    }
    Ok(Ttl::Seconds(secs))
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TtlRepr {
    Seconds(u64),
    Name(String),
}

impl TryFrom<TtlRepr> for Ttl {
    type Error = RecallError;

    fn try_from(repr: TtlRepr) -> Result<Self> {
        match repr {
            TtlRepr::Seconds(secs) => durable(secs),
            TtlRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Ttl> for TtlRepr {
    fn from(ttl: Ttl) -> Self {
        match ttl {
            Ttl::Ephemeral => TtlRepr::Name(EPHEMERAL_TTL_NAME.into()),
            Ttl::Seconds(secs) => TtlRepr::Seconds(secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ephemeral", Ttl::Ephemeral ; "lowercase name")]
    #[test_case("EPHEMERAL", Ttl::Ephemeral ; "uppercase name")]
    #[test_case("60", Ttl::Seconds(60) ; "bare seconds")]
    #[test_case("3600s", Ttl::Seconds(3600) ; "suffixed seconds")]
    #[test_case(" 5 ", Ttl::Seconds(5) ; "padded seconds")]
    fn test_ttl_parse(input: &str, expected: Ttl) {
        assert_eq!(input.parse::<Ttl>().unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("0" ; "zero")]
    #[test_case("-5" ; "negative")]
    #[test_case("forever" ; "unknown name")]
    fn test_ttl_parse_rejects(input: &str) {
        assert!(matches!(input.parse::<Ttl>(), Err(RecallError::ConfigError(_))));
    }

    #[test]
    fn test_ttl_default_is_ephemeral() {
        assert_eq!(Ttl::default(), Ttl::Ephemeral);
        assert!(!Ttl::default().is_durable());
        assert_eq!(Ttl::Ephemeral.duration(), None);
        assert_eq!(Ttl::seconds(60).duration(), Some(Duration::from_secs(60)));
    }

    #[test_case("0", "0" ; "zero")]
    #[test_case("1", "1s" ; "one second")]
    #[test_case("86400", "86400" ; "one day")]
    #[test_case("\"ephemeral\"", "ephemeral" ; "ephemeral")]
    fn test_ttl_deserialize_agrees_with_parse(json: &str, text: &str) {
        let deserialized = serde_json::from_str::<Ttl>(json).ok();
        let parsed = text.parse::<Ttl>().ok();
        assert_eq!(deserialized, parsed);
    }

    #[test]
    fn test_ttl_serde() {
        assert_eq!(serde_json::to_string(&Ttl::Ephemeral).unwrap(), "\"ephemeral\"");
        assert_eq!(serde_json::to_string(&Ttl::Seconds(30)).unwrap(), "30");
        assert_eq!(serde_json::from_str::<Ttl>("30").unwrap(), Ttl::Seconds(30));
        assert_eq!(serde_json::from_str::<Ttl>("\"ephemeral\"").unwrap(), Ttl::Ephemeral);
        assert!(serde_json::from_str::<Ttl>("\"sometimes\"").is_err());
    }
}
