//! The EC signing context.
//!
//! An [`EccContext`] bundles what signing needs besides the key itself: the
//! random source for key generation and probes, and the signing configuration.
//! Key operations that sign or draw randomness borrow a context, so a context
//! always outlives every use made of it.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::config::KeyConfig;
use crate::key::Key;

/// Source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `buf` with bytes suitable for private key material.
    fn strong_rand_bytes(&self, buf: &mut [u8]);

    /// Fill `buf` with bytes for salts and probes.
    fn rand_bytes(&self, buf: &mut [u8]);
}

/// Operating system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn strong_rand_bytes(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    fn rand_bytes(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Process-level signing context.
///
/// k256 arithmetic is constant-time, so no blinding seed is kept here.
pub struct EccContext {
    random: Box<dyn RandomSource>,
    config: KeyConfig,
}

impl EccContext {
    /// Start a context with OS randomness and the default configuration.
    ///
    /// # Panics
    /// If the sanity check fails.
    pub fn start() -> Self {
        Self::with_config(KeyConfig::default())
    }

    /// Start a context with `config` and OS randomness.
    ///
    /// # Panics
    /// If the sanity check fails.
    pub fn with_config(config: KeyConfig) -> Self {
        Self::with_random(config, OsRandom)
    }

    /// Start a context drawing randomness from `random`.
    ///
    /// # Panics
    /// If a freshly generated key fails to verify against its own public key.
    pub fn with_random<R: RandomSource + 'static>(config: KeyConfig, random: R) -> Self {
        let ctx = EccContext {
            random: Box::new(random),
            config,
        };
        assert!(
            ecc_init_sanity_check(&ctx),
            "elliptic curve cryptography sanity check failed"
        );
        debug!(grind_limit = config.grind_limit, "EC context started");
        ctx
    }

    /// The signing configuration.
    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// The random source keys are drawn from.
    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    /// Tear the context down. Dropping it has the same effect.
    pub fn stop(self) {}
}

impl Drop for EccContext {
    fn drop(&mut self) {
        debug!("EC context stopped");
    }
}

impl fmt::Debug for EccContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EccContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Generate a key and check that it verifies against its own public key.
pub fn ecc_init_sanity_check(ctx: &EccContext) -> bool {
    let mut key = Key::new();
    key.make_new_key(ctx, true);
    let pubkey = key.pub_key();
    key.verify_pub_key(ctx, &pubkey)
}
