//! HMAC (RFC 2104) over this crate's SHA-256 and SHA-512.
//!
//! HMAC-SHA512 drives BIP32 child derivation and seed expansion.

use zeroize::Zeroizing;

use crate::sha256::{self, Sha256};
use crate::sha512::{self, Sha512};

macro_rules! hmac_impl {
    ($name:ident, $hasher:ty, $block:expr, $output:expr, $label:literal) => {
        #[doc = concat!("Incremental ", $label, ".")]
        ///
        /// The inner and outer hashers are keyed at construction; `write` feeds
        /// the inner one and `finalize` closes both.
        #[derive(Clone)]
        pub struct $name {
            inner: $hasher,
            outer: $hasher,
        }

        impl $name {
            /// Key a new MAC.
            ///
            /// # Arguments
            /// * `key` - MAC key of any length. Keys longer than the hash block
            ///   are hashed first.
            pub fn new(key: &[u8]) -> Self {
                let mut rkey = Zeroizing::new([0u8; $block]);
                if key.len() <= $block {
                    rkey[..key.len()].copy_from_slice(key);
                } else {
                    let mut hasher = <$hasher>::new();
                    hasher.write(key);
                    rkey[..$output].copy_from_slice(&hasher.finalize());
                }

                let mut pad = Zeroizing::new([0u8; $block]);
                for (p, k) in pad.iter_mut().zip(rkey.iter()) {
                    *p = k ^ 0x5c;
                }
                let mut outer = <$hasher>::new();
                outer.write(&pad[..]);

                for (p, k) in pad.iter_mut().zip(rkey.iter()) {
                    *p = k ^ 0x36;
                }
                let mut inner = <$hasher>::new();
                inner.write(&pad[..]);

                $name { inner, outer }
            }

            /// Absorb message bytes.
            pub fn write(&mut self, data: &[u8]) -> &mut Self {
                self.inner.write(data);
                self
            }

            /// Return the MAC.
            pub fn finalize(self) -> [u8; $output] {
                let $name { inner, mut outer } = self;
                let digest = Zeroizing::new(inner.finalize());
                outer.write(&digest[..]);
                outer.finalize()
            }
        }
    };
}

hmac_impl!(HmacSha256, Sha256, sha256::BLOCK_SIZE, sha256::OUTPUT_SIZE, "HMAC-SHA256");
hmac_impl!(HmacSha512, Sha512, sha512::BLOCK_SIZE, sha512::OUTPUT_SIZE, "HMAC-SHA512");

/// Compute HMAC-SHA256.
///
/// # Arguments
/// * `key` - The HMAC key.
/// * `data` - The message to authenticate.
///
/// # Returns
/// A 32-byte MAC.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new(key);
    mac.write(data);
    mac.finalize()
}

/// Compute HMAC-SHA512.
///
/// # Arguments
/// * `key` - The HMAC key.
/// * `data` - The message to authenticate.
///
/// # Returns
/// A 64-byte MAC.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = HmacSha512::new(key);
    mac.write(data);
    mac.finalize()
}
