//! Key management configuration.

/// Tunables for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    /// Maximum number of extra-entropy retries when grinding for a low R.
    /// Each retry succeeds with probability about 1/2.
    pub grind_limit: u32,
}

impl KeyConfig {
    /// Retry cap used when none is configured.
    pub const DEFAULT_GRIND_LIMIT: u32 = 1024;

    /// Configuration with the default grind limit.
    pub fn new() -> Self {
        KeyConfig {
            grind_limit: Self::DEFAULT_GRIND_LIMIT,
        }
    }

    /// Configuration with a custom grind limit.
    ///
    /// # Arguments
    /// * `grind_limit` - Extra-entropy retries allowed per signature
    pub fn with_grind_limit(grind_limit: u32) -> Self {
        KeyConfig { grind_limit }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self::new()
    }
}
