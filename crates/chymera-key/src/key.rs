//! secp256k1 private keys.
//!
//! A [`Key`] starts out invalid and becomes valid through [`Key::make_new_key`],
//! [`Key::set`] or [`Key::load`], all of which range-check the scalar against
//! the curve order. Everything that needs the secret (public key, DER export,
//! signing, derivation, negation) panics on an invalid key: callers are
//! expected to check [`Key::is_valid`] first.

use std::fmt;

use k256::ecdsa::signature::hazmat::{PrehashSigner, RandomizedPrehashSigner};
use k256::ecdsa::{Signature, SigningKey};
use k256::{FieldBytes, Scalar, SecretKey};
use rand::{CryptoRng, RngCore};
use tracing::trace;
use zeroize::Zeroizing;

use chymera_hash::Hash256;

use crate::context::EccContext;
use crate::der;
use crate::error::KeyError;
use crate::extkey::{bip32_hash, tweak_scalar, ChainCode};
use crate::pubkey::{PubKey, COMPACT_SIGNATURE_SIZE, SIGNATURE_SIZE};

/// Length of a raw private key in bytes.
pub const KEY_SIZE: usize = 32;

const VERIFY_PROBE: &[u8] = b"chymera key verification\n";

/// A secp256k1 private key with its public key compression flag.
#[derive(Clone)]
pub struct Key {
    data: Zeroizing<[u8; KEY_SIZE]>,
    valid: bool,
    compressed: bool,
}

impl Key {
    /// An invalid key.
    pub fn new() -> Self {
        Key {
            data: Zeroizing::new([0u8; KEY_SIZE]),
            valid: false,
            compressed: false,
        }
    }

    /// Whether `bytes` is a 32-byte scalar in `[1, n)`.
    pub fn check(bytes: &[u8]) -> bool {
        bytes.len() == KEY_SIZE && SecretKey::from_bytes(FieldBytes::from_slice(bytes)).is_ok()
    }

    /// Build a valid key from raw bytes.
    ///
    /// # Arguments
    /// * `bytes` - 32-byte big-endian scalar.
    /// * `compressed` - Whether the public key is serialized compressed.
    ///
    /// # Returns
    /// The key, or an error if the scalar is zero, not below the curve order
    /// or not 32 bytes long.
    pub fn from_bytes(bytes: &[u8], compressed: bool) -> Result<Self, KeyError> {
        let mut key = Key::new();
        if key.set(bytes, compressed) {
            Ok(key)
        } else {
            Err(KeyError::InvalidPrivateKey(format!(
                "{} bytes, not a scalar in [1, n)",
                bytes.len()
            )))
        }
    }

    /// Load raw bytes into this key. On failure the key becomes invalid and
    /// keeps its previous bytes.
    pub fn set(&mut self, bytes: &[u8], compressed: bool) -> bool {
        if Self::check(bytes) {
            self.data.copy_from_slice(bytes);
            self.valid = true;
            self.compressed = compressed;
        } else {
            self.valid = false;
        }
        self.valid
    }

    /// Draw fresh key material from the context's strong random source until
    /// it is a valid scalar.
    pub fn make_new_key(&mut self, ctx: &EccContext, compressed: bool) {
        loop {
            ctx.random().strong_rand_bytes(&mut self.data[..]);
            if Self::check(&self.data[..]) {
                break;
            }
        }
        self.valid = true;
        self.compressed = compressed;
    }

    /// Whether the key holds an in-range scalar.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the public key derived from this key is compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The raw scalar bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.data
    }

    fn signing_key(&self) -> SigningKey {
        assert!(self.valid, "operation on an invalid private key");
        match SigningKey::from_bytes(FieldBytes::from_slice(&self.data[..])) {
            Ok(key) => key,
            Err(_) => unreachable!("valid key outside the curve order"),
        }
    }

    fn scalar(&self) -> Scalar {
        *self.signing_key().as_nonzero_scalar().as_ref()
    }

    /// Compute the public key, serialized according to the compression flag.
    pub fn pub_key(&self) -> PubKey {
        let point = self
            .signing_key()
            .verifying_key()
            .to_encoded_point(self.compressed);
        PubKey::from_encoded(point.as_bytes())
    }

    /// Export as SEC1 `ECPrivateKey` DER: 214 bytes for compressed keys,
    /// 279 bytes otherwise.
    pub fn priv_key_der(&self) -> Zeroizing<Vec<u8>> {
        let pubkey = self.pub_key();
        match der::export_private_key(&self.data, pubkey.as_bytes()) {
            Ok(der) => der,
            Err(err) => panic!("SEC1 export of a valid key failed: {err}"),
        }
    }

    /// Import a SEC1 `ECPrivateKey` and take the compression flag from
    /// `pubkey`. Unless `skip_check` is set, the pair is verified by signing a
    /// random probe.
    ///
    /// # Returns
    /// `Ok(())` on success. A DER or range error leaves this key untouched; a
    /// mismatched public key leaves it invalid.
    pub fn load(
        &mut self,
        ctx: &EccContext,
        der: &[u8],
        pubkey: &PubKey,
        skip_check: bool,
    ) -> Result<(), KeyError> {
        let secret = der::import_private_key(der)?;
        self.data.copy_from_slice(&secret[..]);
        self.compressed = pubkey.is_compressed();
        self.valid = true;

        if skip_check || self.verify_pub_key(ctx, pubkey) {
            Ok(())
        } else {
            self.data.fill(0);
            self.valid = false;
            Err(KeyError::KeyMismatch)
        }
    }

    /// Sign a 32-byte hash with RFC6979 nonces, grinding for a low R.
    ///
    /// # Returns
    /// A DER-encoded, low-S signature of at most 71 bytes.
    pub fn sign(&self, ctx: &EccContext, hash: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        self.sign_with(ctx, hash, true, 0)
    }

    /// Sign a 32-byte hash.
    ///
    /// # Arguments
    /// * `ctx` - Signing context; bounds the low-R search.
    /// * `hash` - Message digest.
    /// * `grind` - Retry with counter-derived extra entropy until the R value's
    ///   top byte is below 0x80.
    /// * `test_case` - When not grinding and non-zero, mixed into the nonce as
    ///   extra entropy (little-endian in 32 bytes).
    ///
    /// # Returns
    /// A DER-encoded, low-S signature.
    ///
    /// # Panics
    /// If the key is invalid, or if grinding exceeds the context's
    /// `grind_limit`.
    pub fn sign_with(
        &self,
        ctx: &EccContext,
        hash: &[u8; 32],
        grind: bool,
        test_case: u32,
    ) -> Result<Vec<u8>, KeyError> {
        let signing_key = self.signing_key();
        let mut extra_entropy = [0u8; 32];
        extra_entropy[..4].copy_from_slice(&test_case.to_le_bytes());

        let mut sig = if !grind && test_case != 0 {
            sign_rfc6979(&signing_key, hash, Some(&extra_entropy))?
        } else {
            sign_rfc6979(&signing_key, hash, None)?
        };

        let limit = ctx.config().grind_limit;
        let mut counter = 0u32;
        while grind && !has_low_r(&sig) {
            counter += 1;
            assert!(
                counter <= limit,
                "no low-R signature found in {limit} attempts"
            );
            trace!(counter, "high R, re-signing with extra entropy");
            extra_entropy[..4].copy_from_slice(&counter.to_le_bytes());
            sig = sign_rfc6979(&signing_key, hash, Some(&extra_entropy))?;
        }

        let der = sig.to_der();
        debug_assert!(der.len() <= SIGNATURE_SIZE);
        Ok(der.as_bytes().to_vec())
    }

    /// Sign a 32-byte hash producing a recoverable compact signature.
    ///
    /// # Returns
    /// 65 bytes: `27 + recovery_id + (4 if compressed)`, then R and S.
    pub fn sign_compact(
        &self,
        _ctx: &EccContext,
        hash: &[u8; 32],
    ) -> Result<[u8; COMPACT_SIGNATURE_SIZE], KeyError> {
        let (sig, recid) = self
            .signing_key()
            .sign_prehash_recoverable(hash)
            .map_err(|e| KeyError::Signing(e.to_string()))?;

        let mut out = [0u8; COMPACT_SIGNATURE_SIZE];
        out[0] = 27 + recid.to_byte() + if self.compressed { 4 } else { 0 };
        out[1..].copy_from_slice(&sig.to_bytes());
        Ok(out)
    }

    /// Check that `pubkey` belongs to this key by signing a salted probe and
    /// verifying it.
    pub fn verify_pub_key(&self, ctx: &EccContext, pubkey: &PubKey) -> bool {
        if pubkey.is_compressed() != self.compressed {
            return false;
        }
        let mut salt = [0u8; 8];
        ctx.random().rand_bytes(&mut salt);
        let mut hasher = Hash256::new();
        hasher.write(VERIFY_PROBE).write(&salt);
        let hash = hasher.finalize();

        match self.sign(ctx, &hash) {
            Ok(sig) => pubkey.verify(&hash, &sig),
            Err(_) => false,
        }
    }

    /// Replace the scalar with its negation mod n.
    pub fn negate(&mut self) -> bool {
        let negated = -self.scalar();
        self.data.copy_from_slice(&negated.to_bytes());
        true
    }

    /// BIP32 private child derivation.
    ///
    /// Non-hardened children hash the compressed public key, hardened ones
    /// (`child >= 0x80000000`) hash `0x00 ‖ key`.
    ///
    /// # Returns
    /// The child key (always compressed) and chain code, or
    /// `KeyError::DerivationFailed` when the tweak is not below the curve
    /// order or the child scalar is zero.
    ///
    /// # Panics
    /// If the key is invalid or uncompressed.
    pub fn derive(&self, child: u32, chain_code: &ChainCode) -> Result<(Key, ChainCode), KeyError> {
        assert!(self.valid, "operation on an invalid private key");
        assert!(self.compressed, "BIP32 derivation needs a compressed key");

        let out = if child >> 31 == 0 {
            let pubkey = self.pub_key();
            let bytes = pubkey.as_bytes();
            bip32_hash(chain_code, child, bytes[0], &bytes[1..33])
        } else {
            bip32_hash(chain_code, child, 0, &self.data[..])
        };
        let child_chain_code = ChainCode::from_slice(&out[32..]);

        let sum = self.scalar() + tweak_scalar(&out[..32], child)?;
        if bool::from(sum.is_zero()) {
            return Err(KeyError::DerivationFailed {
                child,
                reason: "child key is zero",
            });
        }

        let mut key = Key::new();
        key.data.copy_from_slice(&sum.to_bytes());
        key.valid = true;
        key.compressed = true;
        Ok((key, child_chain_code))
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.valid == other.valid
            && self.compressed == other.compressed
            && (!self.valid || self.data[..] == other.data[..])
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("valid", &self.valid)
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// Yields a fixed 32-byte string, so k256 mixes it into RFC6979 as the
/// additional data.
struct NonceEntropy([u8; 32]);

impl RngCore for NonceEntropy {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = self.0[i % 32];
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for NonceEntropy {}

fn sign_rfc6979(
    key: &SigningKey,
    hash: &[u8; 32],
    extra_entropy: Option<&[u8; 32]>,
) -> Result<Signature, KeyError> {
    let signed: Result<Signature, k256::ecdsa::Error> = match extra_entropy {
        None => key.sign_prehash(hash),
        Some(entropy) => key.sign_prehash_with_rng(&mut NonceEntropy(*entropy), hash),
    };
    let sig = signed.map_err(|e| KeyError::Signing(e.to_string()))?;
    Ok(sig.normalize_s().unwrap_or(sig))
}

/// Whether R encodes in DER without a sign-padding byte.
fn has_low_r(sig: &Signature) -> bool {
    let (r, _) = sig.split_bytes();
    r[0] < 0x80
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;

    const SECRET: &str = "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35";

    fn secret() -> Key {
        Key::from_bytes(&hex::decode(SECRET).unwrap(), true).unwrap()
    }

    #[test]
    fn test_check_rejects_out_of_range() {
        assert!(!Key::check(&[0u8; 32]));
        assert!(!Key::check(&[0xffu8; 32]));
        let order =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141").unwrap();
        assert!(!Key::check(&order));
        let mut below = order.clone();
        below[31] = 0x40;
        assert!(Key::check(&below));
        assert!(!Key::check(&[1u8; 31]));
    }

    #[test]
    fn test_set_invalidates_on_failure() {
        let mut key = secret();
        assert!(key.is_valid());
        assert!(!key.set(&[0u8; 32], true));
        assert!(!key.is_valid());
    }

    #[test]
    #[should_panic(expected = "invalid private key")]
    fn test_pub_key_of_invalid_key_panics() {
        Key::new().pub_key();
    }

    #[test]
    fn test_pub_key_matches_vector() {
        assert_eq!(
            hex::encode(secret().pub_key().as_bytes()),
            "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2"
        );
    }

    #[test]
    fn test_sign_is_deterministic_and_verifies() {
        let ctx = EccContext::start();
        let key = secret();
        let hash = chymera_hash::hash256(b"deterministic");
        let first = key.sign(&ctx, &hash).unwrap();
        let second = key.sign(&ctx, &hash).unwrap();
        assert_eq!(first, second);
        // Low R never needs a sign-padding byte.
        assert!(first.len() < SIGNATURE_SIZE);
        assert!(key.pub_key().verify(&hash, &first));
    }

    #[test]
    fn test_test_case_changes_signature() {
        let ctx = EccContext::start();
        let key = secret();
        let hash = chymera_hash::hash256(b"test case");
        let plain = key.sign_with(&ctx, &hash, false, 0).unwrap();
        let salted = key.sign_with(&ctx, &hash, false, 7).unwrap();
        assert_ne!(plain, salted);
        assert!(plain.len() <= SIGNATURE_SIZE && salted.len() <= SIGNATURE_SIZE);
        assert!(key.pub_key().verify(&hash, &salted));
    }

    #[test]
    fn test_grinding_always_yields_low_r() {
        let ctx = EccContext::start();
        let key = secret();
        for i in 0u32..32 {
            let hash = chymera_hash::hash256(&i.to_le_bytes());
            let sig = key.sign(&ctx, &hash).unwrap();
            // 30 len 02 rlen r...
            assert!(sig[3] <= 32, "R needed padding for message {i}");
            assert!(sig[4] < 0x80);
        }
    }

    #[test]
    #[should_panic(expected = "no low-R signature")]
    fn test_grind_limit_zero_panics_on_high_r() {
        let ctx = EccContext::with_config(KeyConfig::with_grind_limit(0));
        let key = secret();
        // With no retries allowed, some message among these has a high R.
        for i in 0u32..64 {
            let hash = chymera_hash::hash256(&i.to_be_bytes());
            key.sign(&ctx, &hash).unwrap();
        }
    }

    #[test]
    fn test_sign_compact_header() {
        let ctx = EccContext::start();
        let hash = chymera_hash::hash256(b"compact");
        let compressed = secret();
        let sig = compressed.sign_compact(&ctx, &hash).unwrap();
        assert!((31..=34).contains(&sig[0]));
        assert_eq!(
            PubKey::recover_compact(&hash, &sig).unwrap(),
            compressed.pub_key()
        );

        let uncompressed = Key::from_bytes(compressed.as_bytes(), false).unwrap();
        let sig = uncompressed.sign_compact(&ctx, &hash).unwrap();
        assert!((27..=30).contains(&sig[0]));
        let recovered = PubKey::recover_compact(&hash, &sig).unwrap();
        assert_eq!(recovered.size(), 65);
        assert_eq!(recovered, uncompressed.pub_key());
    }

    #[test]
    fn test_verify_pub_key_rejects_other_key_and_flag() {
        let ctx = EccContext::start();
        let key = secret();
        assert!(key.verify_pub_key(&ctx, &key.pub_key()));

        let mut other = Key::new();
        other.make_new_key(&ctx, true);
        assert!(!key.verify_pub_key(&ctx, &other.pub_key()));

        let uncompressed = Key::from_bytes(key.as_bytes(), false).unwrap();
        assert!(!key.verify_pub_key(&ctx, &uncompressed.pub_key()));
    }

    #[test]
    fn test_negate_twice_is_identity() {
        let mut key = secret();
        let original = key.pub_key();
        assert!(key.negate());
        let negated = key.pub_key();
        assert_ne!(negated, original);
        // Same x coordinate, opposite parity.
        assert_eq!(negated.as_bytes()[1..], original.as_bytes()[1..]);
        assert!(key.negate());
        assert_eq!(key, secret());
    }

    #[test]
    fn test_load_round_trip_and_mismatch() {
        let ctx = EccContext::start();
        let key = secret();
        let der = key.priv_key_der();

        let mut loaded = Key::new();
        loaded.load(&ctx, &der, &key.pub_key(), false).unwrap();
        assert_eq!(loaded, key);

        let mut other = Key::new();
        other.make_new_key(&ctx, true);
        let mut mismatched = Key::new();
        let err = mismatched
            .load(&ctx, &der, &other.pub_key(), false)
            .unwrap_err();
        assert!(matches!(err, KeyError::KeyMismatch));
        assert!(!mismatched.is_valid());

        let mut skipped = Key::new();
        skipped.load(&ctx, &der, &other.pub_key(), true).unwrap();
        assert!(skipped.is_valid());
    }

    #[test]
    fn test_derive_normal_and_hardened_differ() {
        let cc = ChainCode::new([7u8; 32]);
        let (normal, normal_cc) = secret().derive(1, &cc).unwrap();
        let (hardened, hardened_cc) = secret().derive(1 | 0x8000_0000, &cc).unwrap();
        assert!(normal.is_compressed() && hardened.is_compressed());
        assert_ne!(normal, hardened);
        assert_ne!(normal_cc, hardened_cc);
    }
}
