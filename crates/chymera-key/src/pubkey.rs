//! secp256k1 public keys in SEC1 encoding.
//!
//! A [`PubKey`] stores up to 65 bytes and derives its length from the header
//! byte: `0x02`/`0x03` are 33-byte compressed keys, `0x04` (and the hybrid
//! `0x06`/`0x07`) are 65-byte uncompressed keys. Any other header marks the key
//! invalid.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, ProjectivePoint};
use ripemd::{Digest, Ripemd160};

use crate::error::KeyError;
use crate::extkey::{bip32_hash, tweak_scalar, ChainCode};

/// Length of an uncompressed public key.
pub const PUBLIC_KEY_SIZE: usize = 65;
/// Length of a compressed public key.
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
/// Upper bound on a DER-encoded ECDSA signature.
pub const SIGNATURE_SIZE: usize = 72;
/// Length of a recoverable compact signature.
pub const COMPACT_SIGNATURE_SIZE: usize = 65;

const INVALID_HEADER: u8 = 0xff;

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(chymera_hash::sha256(data));
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Hash160 of a serialized public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KeyId(pub [u8; 20]);

impl KeyId {
    /// The 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

fn encoded_len(header: u8) -> usize {
    match header {
        2 | 3 => COMPRESSED_PUBLIC_KEY_SIZE,
        4 | 6 | 7 => PUBLIC_KEY_SIZE,
        _ => 0,
    }
}

/// A serialized secp256k1 public key.
#[derive(Clone, Copy)]
pub struct PubKey {
    data: [u8; PUBLIC_KEY_SIZE],
}

impl PubKey {
    /// An invalid key.
    pub fn new() -> Self {
        let mut data = [0u8; PUBLIC_KEY_SIZE];
        data[0] = INVALID_HEADER;
        PubKey { data }
    }

    /// Parse a serialized key whose length matches its header.
    ///
    /// Only the header and length are checked; use
    /// [`PubKey::is_fully_valid`] to check that the point is on the curve.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let expected = bytes.first().map_or(0, |h| encoded_len(*h));
        if expected == 0 || bytes.len() != expected {
            return Err(KeyError::InvalidPublicKey(format!(
                "{} bytes with header {:#04x}",
                bytes.len(),
                bytes.first().copied().unwrap_or_default()
            )));
        }
        Ok(Self::from_encoded(bytes))
    }

    /// Parse a hex-encoded serialized public key.
    ///
    /// # Arguments
    /// * `hex_str` - Hex of a 33- or 65-byte SEC1 encoding
    ///
    /// # Returns
    /// The key, or `KeyError::InvalidHex` / `KeyError::InvalidPublicKey`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        Self::from_slice(&hex::decode(hex_str)?)
    }

    /// Copy SEC1 bytes produced by k256, which are always well formed.
    pub(crate) fn from_encoded(bytes: &[u8]) -> Self {
        let mut data = [0u8; PUBLIC_KEY_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        PubKey { data }
    }

    fn from_k256(key: &k256::PublicKey, compressed: bool) -> Self {
        Self::from_encoded(key.to_encoded_point(compressed).as_bytes())
    }

    /// Serialized length: 33, 65, or 0 for an invalid key.
    pub fn size(&self) -> usize {
        encoded_len(self.data[0])
    }

    /// The serialized key, 33 or 65 bytes long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size()]
    }

    /// Whether the header and length are well formed.
    pub fn is_valid(&self) -> bool {
        self.size() > 0
    }

    /// Whether the bytes decode to a point on the curve. Hybrid encodings are
    /// rejected.
    pub fn is_fully_valid(&self) -> bool {
        self.is_valid() && VerifyingKey::from_sec1_bytes(self.as_bytes()).is_ok()
    }

    /// Whether the serialization is the 33-byte form.
    pub fn is_compressed(&self) -> bool {
        self.size() == COMPRESSED_PUBLIC_KEY_SIZE
    }

    /// The key's Hash160.
    pub fn id(&self) -> KeyId {
        KeyId(hash160(self.as_bytes()))
    }

    /// Verify a DER-encoded ECDSA signature over a 32-byte hash.
    ///
    /// High-S signatures are normalized before verification, so both forms of
    /// a signature are accepted.
    pub fn verify(&self, hash: &[u8; 32], der: &[u8]) -> bool {
        if !self.is_valid() {
            return false;
        }
        let Ok(key) = VerifyingKey::from_sec1_bytes(self.as_bytes()) else {
            return false;
        };
        let Ok(sig) = Signature::from_der(der) else {
            return false;
        };
        let sig = sig.normalize_s().unwrap_or(sig);
        key.verify_prehash(hash, &sig).is_ok()
    }

    /// Recover the signer's key from a compact signature.
    ///
    /// # Arguments
    /// * `hash` - The signed 32-byte hash.
    /// * `sig` - 65 bytes: header `27..=34`, then R and S.
    ///
    /// # Returns
    /// The public key, compressed when the header carries the `+4` flag.
    pub fn recover_compact(hash: &[u8; 32], sig: &[u8]) -> Result<Self, KeyError> {
        if sig.len() != COMPACT_SIGNATURE_SIZE {
            return Err(KeyError::InvalidSignature(format!(
                "compact signature must be {COMPACT_SIGNATURE_SIZE} bytes, got {}",
                sig.len()
            )));
        }
        let header = sig[0];
        if !(27..=34).contains(&header) {
            return Err(KeyError::InvalidSignature(format!(
                "compact header {header} out of range"
            )));
        }
        let recid = (header - 27) & 3;
        let compressed = (header - 27) & 4 != 0;

        let recid = RecoveryId::from_byte(recid)
            .ok_or_else(|| KeyError::InvalidSignature("bad recovery id".to_string()))?;
        let signature =
            Signature::from_slice(&sig[1..]).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
        let key = VerifyingKey::recover_from_prehash(hash, &signature, recid)
            .map_err(|e| KeyError::InvalidSignature(e.to_string()))?;

        Ok(Self::from_encoded(key.to_encoded_point(compressed).as_bytes()))
    }

    /// BIP32 public child derivation.
    ///
    /// # Returns
    /// The compressed child key and its chain code. Hardened indices, keys
    /// that are not compressed points on the curve and tweaks outside the
    /// curve order are errors.
    pub fn derive(&self, child: u32, chain_code: &ChainCode) -> Result<(PubKey, ChainCode), KeyError> {
        if child >> 31 != 0 {
            return Err(KeyError::HardenedFromPublic(child));
        }
        if !self.is_compressed() {
            return Err(KeyError::InvalidPublicKey(
                "BIP32 derivation needs a compressed key".to_string(),
            ));
        }
        let parent = k256::PublicKey::from_sec1_bytes(self.as_bytes())
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;

        let out = bip32_hash(chain_code, child, self.data[0], &self.data[1..33]);
        let child_chain_code = ChainCode::from_slice(&out[32..]);
        let tweak = tweak_scalar(&out[..32], child)?;

        let point = parent.to_projective() + ProjectivePoint::GENERATOR * tweak;
        let derived = k256::PublicKey::from_affine(AffinePoint::from(point)).map_err(|_| {
            KeyError::DerivationFailed {
                child,
                reason: "child key is the point at infinity",
            }
        })?;
        Ok((Self::from_k256(&derived, true), child_chain_code))
    }
}

impl Default for PubKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PubKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PubKey {}

impl PartialOrd for PubKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PubKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for PubKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EccContext;
    use crate::key::Key;

    const GENERATOR: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_size_follows_header() {
        assert_eq!(PubKey::new().size(), 0);
        assert!(!PubKey::new().is_valid());
        assert!(PubKey::new().as_bytes().is_empty());

        let key = PubKey::from_hex(GENERATOR).unwrap();
        assert_eq!(key.size(), 33);
        assert!(key.is_compressed());
        assert!(key.is_fully_valid());
    }

    #[test]
    fn test_from_slice_rejects_bad_lengths_and_headers() {
        let bytes = hex::decode(GENERATOR).unwrap();
        assert!(PubKey::from_slice(&bytes[..32]).is_err());
        assert!(PubKey::from_slice(&[]).is_err());

        let mut wrong_header = bytes.clone();
        wrong_header[0] = 0x05;
        assert!(PubKey::from_slice(&wrong_header).is_err());

        let mut long = bytes;
        long[0] = 0x04;
        assert!(PubKey::from_slice(&long).is_err());
    }

    #[test]
    fn test_structurally_valid_but_off_curve() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        bytes[32] = 0x05; // x = 5 has no square root for y^2 = x^3 + 7
        let key = PubKey::from_slice(&bytes).unwrap();
        assert!(key.is_valid());
        assert!(!key.is_fully_valid());
    }

    #[test]
    fn test_hybrid_encoding_is_not_fully_valid() {
        let ctx = EccContext::start();
        let mut key = Key::new();
        key.make_new_key(&ctx, false);
        let mut bytes = key.pub_key().as_bytes().to_vec();
        bytes[0] = 0x06 | (bytes[64] & 1);
        let hybrid = PubKey::from_slice(&bytes).unwrap();
        assert!(hybrid.is_valid());
        assert!(!hybrid.is_compressed());
        assert!(!hybrid.is_fully_valid());
    }

    #[test]
    fn test_id_is_hash160() {
        let key = PubKey::from_hex(GENERATOR).unwrap();
        assert_eq!(
            key.id().to_string(),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let key = PubKey::from_hex(GENERATOR).unwrap();
        let hash = [1u8; 32];
        assert!(!key.verify(&hash, &[]));
        assert!(!key.verify(&hash, &[0x30, 0x00]));
        assert!(!PubKey::new().verify(&hash, &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]));
    }

    #[test]
    fn test_verify_accepts_high_s() {
        let ctx = EccContext::start();
        let mut key = Key::new();
        key.make_new_key(&ctx, true);
        let hash = chymera_hash::hash256(b"high s");
        let der = key.sign(&ctx, &hash).unwrap();

        let sig = Signature::from_der(&der).unwrap();
        let (r, s) = sig.split_scalars();
        let high = Signature::from_scalars(r, -*s.as_ref()).unwrap();
        assert!(high.normalize_s().is_some());
        assert!(key.pub_key().verify(&hash, high.to_der().as_bytes()));
    }

    #[test]
    fn test_recover_compact_rejects_bad_input() {
        let hash = [9u8; 32];
        let mut sig = [0u8; 65];
        sig[0] = 26;
        assert!(PubKey::recover_compact(&hash, &sig).is_err());
        sig[0] = 35;
        assert!(PubKey::recover_compact(&hash, &sig).is_err());
        sig[0] = 27;
        // R = S = 0
        assert!(PubKey::recover_compact(&hash, &sig).is_err());
        assert!(PubKey::recover_compact(&hash, &sig[..64]).is_err());
    }

    #[test]
    fn test_derive_matches_private_derivation() {
        let ctx = EccContext::start();
        let mut key = Key::new();
        key.make_new_key(&ctx, true);
        let cc = ChainCode::new([0x42; 32]);

        let (child_key, key_cc) = key.derive(17, &cc).unwrap();
        let (child_pub, pub_cc) = key.pub_key().derive(17, &cc).unwrap();
        assert_eq!(child_key.pub_key(), child_pub);
        assert_eq!(key_cc, pub_cc);
    }

    #[test]
    fn test_derive_rejects_hardened_and_uncompressed() {
        let cc = ChainCode::new([0u8; 32]);
        let key = PubKey::from_hex(GENERATOR).unwrap();
        assert!(matches!(
            key.derive(0x8000_0000, &cc),
            Err(KeyError::HardenedFromPublic(0x8000_0000))
        ));

        let ctx = EccContext::start();
        let mut private = Key::new();
        private.make_new_key(&ctx, false);
        assert!(private.pub_key().derive(0, &cc).is_err());
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let low = PubKey::from_hex(GENERATOR).unwrap();
        let mut bytes = hex::decode(GENERATOR).unwrap();
        bytes[0] = 0x03;
        let high = PubKey::from_slice(&bytes).unwrap();
        assert!(low < high);
        assert_ne!(low, high);
    }
}
