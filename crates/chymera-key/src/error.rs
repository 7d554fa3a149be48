/// Errors raised by key management.
///
/// Malformed input and the rare derivation failures are reported here. Using
/// an invalid key, an exhausted low-R search or a self-test mismatch are
/// caller bugs and panic instead.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Key bytes out of range or of the wrong length.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The bytes do not encode a curve point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A compact signature that cannot be parsed or recovered.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("malformed SEC1 private key: {0}")]
    MalformedDer(&'static str),

    /// The output buffer is too small for the encoded key.
    #[error("DER buffer overflow: capacity {capacity}, needed {needed}")]
    DerOverflow {
        /// Bytes available.
        capacity: usize,
        /// Bytes the encoding takes.
        needed: usize,
    },

    /// A loaded public key is not the one the private key derives.
    #[error("public key does not match private key")]
    KeyMismatch,

    /// A BIP32 payload of the wrong size or with an invalid key.
    #[error("invalid extended key: {0}")]
    InvalidExtendedKey(String),

    /// Child derivation produced an out-of-range tweak or the point at infinity.
    #[error("derivation of child {child} failed: {reason}")]
    DerivationFailed {
        /// Requested child index.
        child: u32,
        /// What went wrong.
        reason: &'static str,
    },

    /// The parent already sits at depth 255.
    #[error("cannot derive below depth 255")]
    DepthOverflow,

    #[error("hardened child {0} cannot be derived from a public key")]
    HardenedFromPublic(u32),

    /// The ECDSA backend rejected the digest or key.
    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for KeyError {
    fn from(e: hex::FromHexError) -> Self {
        KeyError::InvalidHex(e.to_string())
    }
}
