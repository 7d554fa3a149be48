//! BIP32 hierarchical deterministic keys.
//!
//! Extended keys serialize to 74 bytes:
//! `depth ‖ parent fingerprint ‖ BE32(child) ‖ chain code ‖ key`, where the
//! key is `0x00 ‖ private key` for [`ExtKey`] and the compressed public key
//! for [`ExtPubKey`].

use std::fmt;

use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use zeroize::Zeroizing;

use chymera_hash::HmacSha512;

use crate::error::KeyError;
use crate::key::Key;
use crate::pubkey::PubKey;

/// Length of a serialized extended key.
pub const BIP32_EXTKEY_SIZE: usize = 74;

/// Child indices at or above this value are hardened.
pub const HARDENED: u32 = 0x8000_0000;

const SEED_KEY: &[u8] = b"Bitcoin seed";

/// 32 bytes of extra entropy carried alongside a BIP32 key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChainCode([u8; 32]);

impl ChainCode {
    /// Wrap raw chain code bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        ChainCode(bytes)
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        ChainCode(out)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCode({})", hex::encode(self.0))
    }
}

/// HMAC-SHA512(chain code, header ‖ data ‖ BE32(child)).
pub(crate) fn bip32_hash(
    chain_code: &ChainCode,
    child: u32,
    header: u8,
    data: &[u8],
) -> Zeroizing<[u8; 64]> {
    let mut mac = HmacSha512::new(chain_code.as_bytes());
    mac.write(&[header]).write(data).write(&child.to_be_bytes());
    Zeroizing::new(mac.finalize())
}

/// Interpret the left half of a BIP32 hash as a scalar.
pub(crate) fn tweak_scalar(il: &[u8], child: u32) -> Result<Scalar, KeyError> {
    Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(il))).ok_or(
        KeyError::DerivationFailed {
            child,
            reason: "tweak is not below the curve order",
        },
    )
}

fn fingerprint(pubkey: &PubKey) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&pubkey.id().as_bytes()[..4]);
    out
}

fn read_header(code: &[u8]) -> Result<(u8, [u8; 4], u32, ChainCode), KeyError> {
    if code.len() != BIP32_EXTKEY_SIZE {
        return Err(KeyError::InvalidExtendedKey(format!(
            "expected {BIP32_EXTKEY_SIZE} bytes, got {}",
            code.len()
        )));
    }
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(&code[1..5]);
    let child = u32::from_be_bytes([code[5], code[6], code[7], code[8]]);
    Ok((code[0], parent_fingerprint, child, ChainCode::from_slice(&code[9..41])))
}

fn write_header(
    code: &mut [u8; BIP32_EXTKEY_SIZE],
    depth: u8,
    parent_fingerprint: &[u8; 4],
    child: u32,
    chain_code: &ChainCode,
) {
    code[0] = depth;
    code[1..5].copy_from_slice(parent_fingerprint);
    code[5..9].copy_from_slice(&child.to_be_bytes());
    code[9..41].copy_from_slice(chain_code.as_bytes());
}

/// An extended private key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child: u32,
    chain_code: ChainCode,
    key: Key,
}

impl ExtKey {
    /// Derive the master key from a seed.
    ///
    /// # Arguments
    /// * `seed` - Seed bytes, typically 16 to 64 bytes.
    ///
    /// # Returns
    /// The depth-0 master key, or an error in the negligible case that the
    /// seed hashes to an invalid scalar.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let mut mac = HmacSha512::new(SEED_KEY);
        mac.write(seed);
        let out = Zeroizing::new(mac.finalize());

        let key = Key::from_bytes(&out[..32], true).map_err(|_| {
            KeyError::InvalidExtendedKey("seed yields an invalid master key".to_string())
        })?;
        Ok(ExtKey {
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child: 0,
            chain_code: ChainCode::from_slice(&out[32..]),
            key,
        })
    }

    /// Number of derivations from the master key.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// First four bytes of the parent's key id; zero for a master key.
    pub fn parent_fingerprint(&self) -> &[u8; 4] {
        &self.parent_fingerprint
    }

    /// Index this key was derived at.
    pub fn child(&self) -> u32 {
        self.child
    }

    /// The chain code.
    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// The private key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Derive child `child`; indices `>= HARDENED` are hardened.
    pub fn derive(&self, child: u32) -> Result<ExtKey, KeyError> {
        let depth = self.depth.checked_add(1).ok_or(KeyError::DepthOverflow)?;
        let (key, chain_code) = self.key.derive(child, &self.chain_code)?;
        Ok(ExtKey {
            depth,
            parent_fingerprint: fingerprint(&self.key.pub_key()),
            child,
            chain_code,
            key,
        })
    }

    /// Derive along a path of child indices.
    pub fn derive_path(&self, path: &[u32]) -> Result<ExtKey, KeyError> {
        path.iter()
            .try_fold(self.clone(), |node, child| node.derive(*child))
    }

    /// Drop the private key.
    pub fn neuter(&self) -> ExtPubKey {
        ExtPubKey {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child: self.child,
            chain_code: self.chain_code,
            pubkey: self.key.pub_key(),
        }
    }

    /// Serialize to the 74-byte BIP32 layout with a zero byte before the key.
    ///
    /// # Returns
    /// The encoding, wiped on drop.
    pub fn encode(&self) -> Zeroizing<[u8; BIP32_EXTKEY_SIZE]> {
        let mut code = Zeroizing::new([0u8; BIP32_EXTKEY_SIZE]);
        write_header(
            &mut code,
            self.depth,
            &self.parent_fingerprint,
            self.child,
            &self.chain_code,
        );
        code[41] = 0;
        code[42..].copy_from_slice(self.key.as_bytes());
        code
    }

    /// Parse a 74-byte extended private key. Byte 41 is not inspected.
    pub fn decode(code: &[u8]) -> Result<Self, KeyError> {
        let (depth, parent_fingerprint, child, chain_code) = read_header(code)?;
        let key = Key::from_bytes(&code[42..], true)
            .map_err(|_| KeyError::InvalidExtendedKey("private key out of range".to_string()))?;
        Ok(ExtKey {
            depth,
            parent_fingerprint,
            child,
            chain_code,
            key,
        })
    }
}

/// An extended public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtPubKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child: u32,
    chain_code: ChainCode,
    pubkey: PubKey,
}

impl ExtPubKey {
    /// Number of derivations from the master key.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Parent key id prefix.
    pub fn parent_fingerprint(&self) -> &[u8; 4] {
        &self.parent_fingerprint
    }

    /// Index this key was derived at.
    pub fn child(&self) -> u32 {
        self.child
    }

    /// The chain code.
    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// The public key.
    pub fn pubkey(&self) -> &PubKey {
        &self.pubkey
    }

    /// Derive non-hardened child `child`.
    pub fn derive(&self, child: u32) -> Result<ExtPubKey, KeyError> {
        let depth = self.depth.checked_add(1).ok_or(KeyError::DepthOverflow)?;
        let (pubkey, chain_code) = self.pubkey.derive(child, &self.chain_code)?;
        Ok(ExtPubKey {
            depth,
            parent_fingerprint: fingerprint(&self.pubkey),
            child,
            chain_code,
            pubkey,
        })
    }

    /// Serialize to the 74-byte BIP32 layout with the 33-byte compressed key.
    pub fn encode(&self) -> [u8; BIP32_EXTKEY_SIZE] {
        let mut code = [0u8; BIP32_EXTKEY_SIZE];
        write_header(
            &mut code,
            self.depth,
            &self.parent_fingerprint,
            self.child,
            &self.chain_code,
        );
        code[41..].copy_from_slice(self.pubkey.as_bytes());
        code
    }

    /// Parse a 74-byte extended public key. The key must carry a compressed
    /// header; the point itself is checked on derivation.
    pub fn decode(code: &[u8]) -> Result<Self, KeyError> {
        let (depth, parent_fingerprint, child, chain_code) = read_header(code)?;
        let pubkey = PubKey::from_slice(&code[41..])?;
        Ok(ExtPubKey {
            depth,
            parent_fingerprint,
            child,
            chain_code,
            pubkey,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn master() -> ExtKey {
        ExtKey::from_seed(&hex::decode(SEED).unwrap()).unwrap()
    }

    #[test]
    fn test_master_from_seed() {
        let m = master();
        assert_eq!(m.depth(), 0);
        assert_eq!(m.child(), 0);
        assert_eq!(m.parent_fingerprint(), &[0u8; 4]);
        assert_eq!(
            hex::encode(m.chain_code().as_bytes()),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(
            hex::encode(m.key().as_bytes()),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
    }

    #[test]
    fn test_first_hardened_child() {
        let child = master().derive(HARDENED).unwrap();
        assert_eq!(child.depth(), 1);
        assert_eq!(hex::encode(child.parent_fingerprint()), "3442193e");
        assert_eq!(
            hex::encode(child.key().as_bytes()),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
    }

    #[test]
    fn test_depth_overflow() {
        let mut code = master().encode();
        code[0] = 255;
        let deep = ExtKey::decode(&code[..]).unwrap();
        assert!(matches!(deep.derive(0), Err(KeyError::DepthOverflow)));
        assert!(matches!(deep.neuter().derive(0), Err(KeyError::DepthOverflow)));

        code[0] = 254;
        assert_eq!(ExtKey::decode(&code[..]).unwrap().derive(0).unwrap().depth(), 255);
    }

    #[test]
    fn test_public_derivation_rejects_hardened() {
        let xpub = master().neuter();
        assert!(matches!(
            xpub.derive(HARDENED + 5),
            Err(KeyError::HardenedFromPublic(idx)) if idx == HARDENED + 5
        ));
    }

    #[test]
    fn test_neuter_commutes_with_normal_derivation() {
        let m = master();
        assert_eq!(m.derive(7).unwrap().neuter(), m.neuter().derive(7).unwrap());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let code = master().encode();
        assert!(ExtKey::decode(&code[..73]).is_err());

        let mut zero_key = *code;
        zero_key[42..].fill(0);
        assert!(matches!(
            ExtKey::decode(&zero_key),
            Err(KeyError::InvalidExtendedKey(_))
        ));

        let mut xpub = master().neuter().encode();
        xpub[41] = 0x04;
        assert!(ExtPubKey::decode(&xpub).is_err());
        assert!(ExtPubKey::decode(&[0u8; 75]).is_err());
    }

    #[test]
    fn test_derive_path() {
        let m = master();
        let walked = m.derive_path(&[HARDENED, 1]).unwrap();
        assert_eq!(walked, m.derive(HARDENED).unwrap().derive(1).unwrap());
        assert_eq!(m.derive_path(&[]).unwrap(), m);
    }
}
