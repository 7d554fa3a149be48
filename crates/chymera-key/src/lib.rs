//! Chymera key management.
//!
//! secp256k1 keys on top of `k256`:
//! - Private keys with range checking, SEC1 DER export/import and negation
//! - Deterministic ECDSA (RFC6979) with low-S output and low-R grinding
//! - Recoverable compact signatures
//! - BIP32 extended keys: seed expansion, private/public derivation, 74-byte
//!   encoding
//! - The signing context carrying the random source and configuration

pub mod config;
pub mod context;
pub mod der;
pub mod extkey;
pub mod key;
pub mod pubkey;

mod error;

pub use config::KeyConfig;
pub use context::{ecc_init_sanity_check, EccContext, OsRandom, RandomSource};
pub use der::{COMPRESSED_PRIVATE_KEY_DER_SIZE, PRIVATE_KEY_DER_SIZE};
pub use error::KeyError;
pub use extkey::{ChainCode, ExtKey, ExtPubKey, BIP32_EXTKEY_SIZE, HARDENED};
pub use key::{Key, KEY_SIZE};
pub use pubkey::{
    hash160, KeyId, PubKey, COMPACT_SIGNATURE_SIZE, COMPRESSED_PUBLIC_KEY_SIZE, PUBLIC_KEY_SIZE,
    SIGNATURE_SIZE,
};
