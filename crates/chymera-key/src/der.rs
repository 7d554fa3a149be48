//! SEC1 `ECPrivateKey` encoding.
//!
//! Export splices the raw key and public key into fixed templates that carry
//! the full secp256k1 domain parameters. Import is deliberately permissive and
//! only reads as far as the private key OCTET STRING.

use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::key::{Key, KEY_SIZE};
use crate::pubkey::{COMPRESSED_PUBLIC_KEY_SIZE, PUBLIC_KEY_SIZE};

/// Size of an exported key with an uncompressed public key.
pub const PRIVATE_KEY_DER_SIZE: usize = 279;
/// Size of an exported key with a compressed public key.
pub const COMPRESSED_PRIVATE_KEY_DER_SIZE: usize = 214;

const COMPRESSED_BEGIN: [u8; 8] = [
    0x30, 0x81, 0xD3, 0x02, 0x01, 0x01, 0x04, 0x20,
];

const COMPRESSED_MIDDLE: [u8; 141] = [
    0xA0, 0x81, 0x85, 0x30, 0x81, 0x82, 0x02, 0x01, 0x01, 0x30, 0x2C, 0x06, 0x07, 0x2A, 0x86, 0x48,
    0xCE, 0x3D, 0x01, 0x01, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F, 0x30, 0x06, 0x04, 0x01, 0x00, 0x04, 0x01, 0x07, 0x04,
    0x21, 0x02, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87,
    0x0B, 0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8,
    0x17, 0x98, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E,
    0x8C, 0xD0, 0x36, 0x41, 0x41, 0x02, 0x01, 0x01, 0xA1, 0x24, 0x03, 0x22, 0x00,
];

const UNCOMPRESSED_BEGIN: [u8; 9] = [
    0x30, 0x82, 0x01, 0x13, 0x02, 0x01, 0x01, 0x04, 0x20,
];

const UNCOMPRESSED_MIDDLE: [u8; 173] = [
    0xA0, 0x81, 0xA5, 0x30, 0x81, 0xA2, 0x02, 0x01, 0x01, 0x30, 0x2C, 0x06, 0x07, 0x2A, 0x86, 0x48,
    0xCE, 0x3D, 0x01, 0x01, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F, 0x30, 0x06, 0x04, 0x01, 0x00, 0x04, 0x01, 0x07, 0x04,
    0x41, 0x04, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87,
    0x0B, 0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8,
    0x17, 0x98, 0x48, 0x3A, 0xDA, 0x77, 0x26, 0xA3, 0xC4, 0x65, 0x5D, 0xA4, 0xFB, 0xFC, 0x0E, 0x11,
    0x08, 0xA8, 0xFD, 0x17, 0xB4, 0x48, 0xA6, 0x85, 0x54, 0x19, 0x9C, 0x47, 0xD0, 0x8F, 0xFB, 0x10,
    0xD4, 0xB8, 0x02, 0x21, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E,
    0x8C, 0xD0, 0x36, 0x41, 0x41, 0x02, 0x01, 0x01, 0xA1, 0x44, 0x03, 0x42, 0x00,
];

/// Fixed-capacity writer for secret DER output.
pub(crate) struct DerBuilder<const N: usize> {
    buf: Zeroizing<[u8; N]>,
    len: usize,
}

impl<const N: usize> DerBuilder<N> {
    pub(crate) fn new() -> Self {
        DerBuilder {
            buf: Zeroizing::new([0u8; N]),
            len: 0,
        }
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<&mut Self, KeyError> {
        let needed = self.len + bytes.len();
        if needed > N {
            return Err(KeyError::DerOverflow {
                capacity: N,
                needed,
            });
        }
        self.buf[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(self)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn finish(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.buf[..self.len].to_vec())
    }
}

/// Serialize a private key as SEC1 `ECPrivateKey` with the optional
/// parameters and public key fields.
///
/// # Arguments
/// * `key` - Raw 32-byte private key.
/// * `pubkey` - Its serialized public key; the length picks the template.
///
/// # Returns
/// 214 bytes for a compressed public key, 279 bytes for an uncompressed one.
pub fn export_private_key(
    key: &[u8; KEY_SIZE],
    pubkey: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let mut builder = DerBuilder::<PRIVATE_KEY_DER_SIZE>::new();
    match pubkey.len() {
        COMPRESSED_PUBLIC_KEY_SIZE => {
            builder
                .append(&COMPRESSED_BEGIN)?
                .append(key)?
                .append(&COMPRESSED_MIDDLE)?
                .append(pubkey)?;
            assert_eq!(builder.len(), COMPRESSED_PRIVATE_KEY_DER_SIZE);
        }
        PUBLIC_KEY_SIZE => {
            builder
                .append(&UNCOMPRESSED_BEGIN)?
                .append(key)?
                .append(&UNCOMPRESSED_MIDDLE)?
                .append(pubkey)?;
            assert_eq!(builder.len(), PRIVATE_KEY_DER_SIZE);
        }
        other => {
            return Err(KeyError::InvalidPublicKey(format!(
                "cannot embed a {other}-byte public key"
            )))
        }
    }
    Ok(builder.finish())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], KeyError> {
        if n > self.remaining() {
            return Err(KeyError::MalformedDer(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, KeyError> {
        Ok(self.read_bytes(1, what)?[0])
    }
}

/// Parse the private key out of a SEC1 `ECPrivateKey`.
///
/// Accepted deviations from strict DER:
/// - the SEQUENCE length is always long form, in one or two octets;
/// - the SEQUENCE may be followed by junk;
/// - the private key OCTET STRING may be shorter than 32 bytes and is
///   left-padded with zeros;
/// - nothing after the OCTET STRING is read.
///
/// # Returns
/// The 32-byte key, or an error if the structure is malformed or the scalar is
/// out of range.
pub fn import_private_key(der: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>, KeyError> {
    let mut reader = Reader::new(der);

    if reader.read_u8("missing SEQUENCE")? != 0x30 {
        return Err(KeyError::MalformedDer("missing SEQUENCE"));
    }
    let len_byte = reader.read_u8("missing SEQUENCE length")?;
    if len_byte & 0x80 == 0 {
        return Err(KeyError::MalformedDer("SEQUENCE length is not long form"));
    }
    let lenb = usize::from(len_byte & 0x7f);
    if !(1..=2).contains(&lenb) {
        return Err(KeyError::MalformedDer("SEQUENCE length must use 1 or 2 octets"));
    }
    let len = reader
        .read_bytes(lenb, "truncated SEQUENCE length")?
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    if len > reader.remaining() {
        return Err(KeyError::MalformedDer("SEQUENCE longer than input"));
    }

    if reader.read_bytes(3, "missing version")? != [0x02, 0x01, 0x01] {
        return Err(KeyError::MalformedDer("version is not 1"));
    }

    if reader.read_u8("missing private key")? != 0x04 {
        return Err(KeyError::MalformedDer("private key is not an OCTET STRING"));
    }
    let oslen = usize::from(reader.read_u8("missing private key length")?);
    if oslen > KEY_SIZE {
        return Err(KeyError::MalformedDer("private key longer than 32 bytes"));
    }
    let secret = reader.read_bytes(oslen, "truncated private key")?;

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    out[KEY_SIZE - oslen..].copy_from_slice(secret);
    if !Key::check(&out[..]) {
        return Err(KeyError::InvalidPrivateKey(
            "SEC1 private key out of range".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [
        0x0c, 0x28, 0xfc, 0xa3, 0x86, 0xc7, 0xa2, 0x27, 0x60, 0x0b, 0x2f, 0xe5, 0x0b, 0x7c, 0xae,
        0x11, 0xec, 0x86, 0xd3, 0xbf, 0x1f, 0xbe, 0x47, 0x1b, 0xe8, 0x98, 0x27, 0xe1, 0x9d, 0x72,
        0xaa, 0x1d,
    ];

    fn compressed_der() -> Zeroizing<Vec<u8>> {
        let key = Key::from_bytes(&SECRET, true).unwrap();
        export_private_key(&SECRET, key.pub_key().as_bytes()).unwrap()
    }

    #[test]
    fn test_export_sizes() {
        let compressed = Key::from_bytes(&SECRET, true).unwrap();
        let uncompressed = Key::from_bytes(&SECRET, false).unwrap();
        assert_eq!(compressed.priv_key_der().len(), COMPRESSED_PRIVATE_KEY_DER_SIZE);
        assert_eq!(uncompressed.priv_key_der().len(), PRIVATE_KEY_DER_SIZE);
    }

    #[test]
    fn test_export_layout() {
        let der = compressed_der();
        assert_eq!(&der[..8], &COMPRESSED_BEGIN[..]);
        assert_eq!(&der[8..40], &SECRET[..]);
        // Declared SEQUENCE length covers the rest of the encoding.
        assert_eq!(usize::from(der[2]) + 3, der.len());
        let pubkey = Key::from_bytes(&SECRET, true).unwrap().pub_key();
        assert_eq!(&der[181..], pubkey.as_bytes());
    }

    #[test]
    fn test_export_rejects_bad_pubkey_length() {
        assert!(matches!(
            export_private_key(&SECRET, &[0x02; 20]),
            Err(KeyError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_builder_overflow() {
        let mut builder = DerBuilder::<4>::new();
        builder.append(&[1, 2, 3]).unwrap();
        let err = builder.append(&[4, 5]).err().unwrap();
        assert!(matches!(
            err,
            KeyError::DerOverflow {
                capacity: 4,
                needed: 5
            }
        ));
        assert_eq!(&builder.finish()[..], &[1, 2, 3]);
    }

    #[test]
    fn test_import_round_trip() {
        assert_eq!(&import_private_key(&compressed_der()).unwrap()[..], &SECRET[..]);
        let uncompressed = Key::from_bytes(&SECRET, false).unwrap().priv_key_der();
        assert_eq!(&import_private_key(&uncompressed).unwrap()[..], &SECRET[..]);
    }

    #[test]
    fn test_import_tolerates_trailing_junk_and_two_byte_length() {
        let mut der = compressed_der().to_vec();
        der.extend_from_slice(&[0xde, 0xad]);
        assert!(import_private_key(&der).is_ok());

        // 30 82 00 d3 instead of 30 81 d3
        let mut wide = vec![0x30, 0x82, 0x00, 0xd3];
        wide.extend_from_slice(&compressed_der()[3..]);
        assert_eq!(&import_private_key(&wide).unwrap()[..], &SECRET[..]);
    }

    #[test]
    fn test_import_left_pads_short_key() {
        let der = [0x30, 0x81, 0x06, 0x02, 0x01, 0x01, 0x04, 0x01, 0x07];
        let key = import_private_key(&der).unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 7;
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn test_import_rejects_malformed() {
        let good = compressed_der();
        let cases: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x31],
            vec![0x30, 0x20],
            vec![0x30, 0x83, 0x00, 0x00, 0xd3],
            vec![0x30, 0x80],
            vec![0x30, 0x82, 0x01],
            vec![0x30, 0x81, 0xff, 0x02, 0x01, 0x01],
            vec![0x30, 0x81, 0x03, 0x02, 0x01, 0x02],
            vec![0x30, 0x81, 0x05, 0x02, 0x01, 0x01, 0x03, 0x00],
            [&[0x30, 0x81, 0x26, 0x02, 0x01, 0x01, 0x04, 0x21][..], &[1u8; 33][..]].concat(),
            good[..20].to_vec(),
        ];
        for case in cases {
            assert!(
                matches!(import_private_key(&case), Err(KeyError::MalformedDer(_))),
                "{}",
                hex::encode(&case)
            );
        }
    }

    #[test]
    fn test_import_rejects_out_of_range_key() {
        let mut der = vec![0x30, 0x81, 0x25, 0x02, 0x01, 0x01, 0x04, 0x20];
        der.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            import_private_key(&der),
            Err(KeyError::InvalidPrivateKey(_))
        ));
    }
}
