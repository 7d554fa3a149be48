//! Chymera hash engine.
//!
//! This crate provides the hashing primitives of the Chymera core:
//! - Incremental SHA-256 and SHA-512 with streaming `write`/`finalize`
//! - Runtime-selected SHA-256 transforms (portable, SSE4.1, AVX2, SHA-NI)
//!   verified against a known-answer self-test before first use
//! - Batched double-SHA-256 of 64-byte blocks (`sha256d64`) at 1/2/4/8-way width
//! - HMAC-SHA256 / HMAC-SHA512 and the double-SHA-256 writer `Hash256`

pub mod config;
pub mod engine;
pub mod hash256;
pub mod hmac;
pub mod selftest;
pub mod sha256;
pub mod sha512;

mod error;

pub use config::{HashConfig, StrategyPreference};
pub use engine::{
    init_sha256_engine, sha256_autodetect, sha256_engine, CpuFeatures, D64Fn, Sha256Engine,
    Strategy, TransformFn,
};
pub use error::HashError;
pub use hash256::Hash256;
pub use hmac::{hmac_sha256, hmac_sha512, HmacSha256, HmacSha512};
pub use sha256::Sha256;
pub use sha512::Sha512;

/// Compute the SHA-256 digest of `data` with the process-wide engine.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.write(data);
    hasher.finalize()
}

/// Compute the SHA-512 digest of `data`.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.write(data);
    hasher.finalize()
}

/// Compute SHA-256(SHA-256(data)).
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Hash256::new();
    hasher.write(data);
    hasher.finalize()
}

/// Double-SHA-256 every 64-byte block of `input` into consecutive 32-byte
/// digests of `out`, using the widest batch transforms the CPU offers.
///
/// # Panics
/// If `input` is not a whole number of 64-byte blocks or `out` is shorter
/// than 32 bytes per block.
pub fn sha256d64(out: &mut [u8], input: &[u8]) {
    sha256_engine().double_sha256_64(out, input)
}
