#![deny(missing_docs)]

//! Chymera cryptographic core.
//!
//! Re-exports the hash engine and key management crates and provides
//! [`CryptoCore`], which brings both up in the right order: the SHA-256 engine
//! is selected and self-tested first, then the EC context is started and
//! sanity-checked.

pub use chymera_hash as hash;
pub use chymera_key as key;

use tracing::info;

use chymera_hash::{init_sha256_engine, HashConfig, HashError, Sha256Engine};
use chymera_key::{EccContext, KeyConfig};

/// The process's hashing engine and signing context.
#[derive(Debug)]
pub struct CryptoCore {
    hash: &'static Sha256Engine,
    ecc: EccContext,
}

impl CryptoCore {
    /// Install the SHA-256 engine and start an EC context.
    ///
    /// The engine is process-wide: if one is already installed it is reused
    /// and `hash_config` is ignored.
    ///
    /// # Panics
    /// If the selected engine fails its self-test or the EC sanity check
    /// fails.
    pub fn start(hash_config: HashConfig, key_config: KeyConfig) -> Self {
        let hash = init_sha256_engine(&hash_config);
        let ecc = EccContext::with_config(key_config);
        info!(
            sha256 = hash.describe(),
            grind_limit = key_config.grind_limit,
            "crypto core started"
        );
        CryptoCore { hash, ecc }
    }

    /// [`CryptoCore::start`] with the hash configuration read from the
    /// environment and the default key configuration.
    pub fn from_env() -> Result<Self, HashError> {
        Ok(Self::start(HashConfig::from_env()?, KeyConfig::default()))
    }

    /// The installed SHA-256 engine.
    pub fn hash_engine(&self) -> &'static Sha256Engine {
        self.hash
    }

    /// The EC signing context.
    pub fn ecc(&self) -> &EccContext {
        &self.ecc
    }

    /// Tear down the EC context. The hash engine stays installed.
    pub fn stop(self) {
        self.ecc.stop();
    }
}
