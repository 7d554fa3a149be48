//! Hash engine configuration.

use std::str::FromStr;

use crate::engine::Strategy;
use crate::error::HashError;

/// Which SHA-256 implementation to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyPreference {
    /// Pick the best implementation the CPU supports.
    #[default]
    Auto,
    /// Use this implementation if the CPU supports it, otherwise fall back to
    /// detection.
    Force(Strategy),
}

impl FromStr for StrategyPreference {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "auto" => Ok(StrategyPreference::Auto),
            other => other.parse().map(StrategyPreference::Force),
        }
    }
}

/// Configuration for the process-wide hash engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashConfig {
    pub strategy: StrategyPreference,
}

impl HashConfig {
    /// Environment variable read by [`HashConfig::from_env`].
    pub const ENV_VAR: &'static str = "CHYMERA_SHA256_IMPL";

    /// Detect the best implementation at startup.
    pub fn auto() -> Self {
        HashConfig {
            strategy: StrategyPreference::Auto,
        }
    }

    /// Request a specific implementation.
    pub fn forced(strategy: Strategy) -> Self {
        HashConfig {
            strategy: StrategyPreference::Force(strategy),
        }
    }

    /// Read the preference from `CHYMERA_SHA256_IMPL`
    /// (`auto`, `standard`, `sse4`, `avx2` or `shani`). An unset variable
    /// means `auto`.
    pub fn from_env() -> Result<Self, HashError> {
        match std::env::var(Self::ENV_VAR) {
            Ok(value) => Ok(HashConfig {
                strategy: value.parse()?,
            }),
            Err(_) => Ok(Self::auto()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preferences() {
        assert_eq!("auto".parse::<StrategyPreference>().unwrap(), StrategyPreference::Auto);
        assert_eq!("".parse::<StrategyPreference>().unwrap(), StrategyPreference::Auto);
        assert_eq!(
            " shani ".parse::<StrategyPreference>().unwrap(),
            StrategyPreference::Force(Strategy::ShaNi)
        );
        assert_eq!(
            "standard".parse::<StrategyPreference>().unwrap(),
            StrategyPreference::Force(Strategy::Standard)
        );
    }

    #[test]
    fn test_parse_unknown_preference() {
        let err = "sse9".parse::<StrategyPreference>().unwrap_err();
        assert!(matches!(err, HashError::UnknownStrategy(ref s) if s == "sse9"));
    }

    #[test]
    fn test_default_is_auto() {
        assert_eq!(HashConfig::default(), HashConfig::auto());
        assert_eq!(
            HashConfig::forced(Strategy::Avx2).strategy,
            StrategyPreference::Force(Strategy::Avx2)
        );
    }
}
