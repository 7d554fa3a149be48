//! Incremental SHA-512.
//!
//! Only a portable transform exists; SHA-512 is used for HMAC-SHA512 in key
//! derivation, which is never the hot path.

/// SHA-512 block size in bytes.
pub const BLOCK_SIZE: usize = 128;

/// SHA-512 digest size in bytes.
pub const OUTPUT_SIZE: usize = 64;

const INIT: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

const K: [u64; 80] = [
    0x428a2f98d728ae22, 0x7137449123ef65cd, 0xb5c0fbcfec4d3b2f, 0xe9b5dba58189dbbc,
    0x3956c25bf348b538, 0x59f111f1b605d019, 0x923f82a4af194f9b, 0xab1c5ed5da6d8118,
    0xd807aa98a3030242, 0x12835b0145706fbe, 0x243185be4ee4b28c, 0x550c7dc3d5ffb4e2,
    0x72be5d74f27b896f, 0x80deb1fe3b1696b1, 0x9bdc06a725c71235, 0xc19bf174cf692694,
    0xe49b69c19ef14ad2, 0xefbe4786384f25e3, 0x0fc19dc68b8cd5b5, 0x240ca1cc77ac9c65,
    0x2de92c6f592b0275, 0x4a7484aa6ea6e483, 0x5cb0a9dcbd41fbd4, 0x76f988da831153b5,
    0x983e5152ee66dfab, 0xa831c66d2db43210, 0xb00327c898fb213f, 0xbf597fc7beef0ee4,
    0xc6e00bf33da88fc2, 0xd5a79147930aa725, 0x06ca6351e003826f, 0x142929670a0e6e70,
    0x27b70a8546d22ffc, 0x2e1b21385c26c926, 0x4d2c6dfc5ac42aed, 0x53380d139d95b3df,
    0x650a73548baf63de, 0x766a0abb3c77b2a8, 0x81c2c92e47edaee6, 0x92722c851482353b,
    0xa2bfe8a14cf10364, 0xa81a664bbc423001, 0xc24b8b70d0f89791, 0xc76c51a30654be30,
    0xd192e819d6ef5218, 0xd69906245565a910, 0xf40e35855771202a, 0x106aa07032bbd1b8,
    0x19a4c116b8d2d0c8, 0x1e376c085141ab53, 0x2748774cdf8eeb99, 0x34b0bcb5e19b48a8,
    0x391c0cb3c5c95a63, 0x4ed8aa4ae3418acb, 0x5b9cca4f7763e373, 0x682e6ff3d6b2b8a3,
    0x748f82ee5defb2fc, 0x78a5636f43172f60, 0x84c87814a1f0ab72, 0x8cc702081a6439ec,
    0x90befffa23631e28, 0xa4506cebde82bde9, 0xbef9a3f7b2c67915, 0xc67178f2e372532b,
    0xca273eceea26619c, 0xd186b8c721c0c207, 0xeada7dd6cde0eb1e, 0xf57d4f7fee6ed178,
    0x06f067aa72176fba, 0x0a637dc5a2c898a6, 0x113f9804bef90dae, 0x1b710b35131c471b,
    0x28db77f523047d84, 0x32caab7b40c72493, 0x3c9ebe0a15c9bebc, 0x431d67c49c100d4c,
    0x4cc5d4becb3e42b6, 0x597f299cfc657e2a, 0x5fcb6fab3ad6faec, 0x6c44198c4a475817,
];

const PADDING: [u8; BLOCK_SIZE] = {
    let mut pad = [0u8; BLOCK_SIZE];
    pad[0] = 0x80;
    pad
};

#[inline(always)]
fn big_sigma0(x: u64) -> u64 {
    x.rotate_right(28) ^ x.rotate_right(34) ^ x.rotate_right(39)
}

#[inline(always)]
fn big_sigma1(x: u64) -> u64 {
    x.rotate_right(14) ^ x.rotate_right(18) ^ x.rotate_right(41)
}

#[inline(always)]
fn sigma0(x: u64) -> u64 {
    x.rotate_right(1) ^ x.rotate_right(8) ^ (x >> 7)
}

#[inline(always)]
fn sigma1(x: u64) -> u64 {
    x.rotate_right(19) ^ x.rotate_right(61) ^ (x >> 6)
}

/// Advance `state` over every whole 128-byte block of `blocks`.
fn transform(state: &mut [u64; 8], blocks: &[u8]) {
    for block in blocks.chunks_exact(BLOCK_SIZE) {
        let mut w = [0u64; 16];
        for (word, bytes) in w.iter_mut().zip(block.chunks_exact(8)) {
            let mut be = [0u8; 8];
            be.copy_from_slice(bytes);
            *word = u64::from_be_bytes(be);
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;
        for (i, k) in K.iter().enumerate() {
            if i >= 16 {
                let j = i & 15;
                w[j] = w[j]
                    .wrapping_add(sigma1(w[(i + 14) & 15]))
                    .wrapping_add(w[(i + 9) & 15])
                    .wrapping_add(sigma0(w[(i + 1) & 15]));
            }
            let t1 = h
                .wrapping_add(big_sigma1(e))
                .wrapping_add(g ^ (e & (f ^ g)))
                .wrapping_add(*k)
                .wrapping_add(w[i & 15]);
            let t2 = big_sigma0(a).wrapping_add((a & b) | (c & (a | b)));
            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(t1);
            d = c;
            c = b;
            b = a;
            a = t1.wrapping_add(t2);
        }

        for (s, v) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *s = s.wrapping_add(v);
        }
    }
}

/// Incremental SHA-512 hasher.
#[derive(Clone, Debug)]
pub struct Sha512 {
    state: [u64; 8],
    buf: [u8; BLOCK_SIZE],
    bytes: u64,
}

impl Sha512 {
    /// Create a hasher at the initial state.
    pub fn new() -> Self {
        Sha512 {
            state: INIT,
            buf: [0u8; BLOCK_SIZE],
            bytes: 0,
        }
    }

    /// Absorb `data`, transforming whole blocks straight from the input.
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        let mut data = data;
        let mut bufsize = (self.bytes % BLOCK_SIZE as u64) as usize;
        if bufsize != 0 && bufsize + data.len() >= BLOCK_SIZE {
            let fill = BLOCK_SIZE - bufsize;
            self.buf[bufsize..].copy_from_slice(&data[..fill]);
            self.bytes += fill as u64;
            data = &data[fill..];
            transform(&mut self.state, &self.buf);
            bufsize = 0;
        }
        let whole = data.len() - data.len() % BLOCK_SIZE;
        if whole > 0 {
            transform(&mut self.state, &data[..whole]);
            self.bytes += whole as u64;
            data = &data[whole..];
        }
        if !data.is_empty() {
            self.buf[bufsize..bufsize + data.len()].copy_from_slice(data);
            self.bytes += data.len() as u64;
        }
        self
    }

    /// Pad, append the 128-bit big-endian bit length and return the digest.
    pub fn finalize(mut self) -> [u8; OUTPUT_SIZE] {
        let mut size_desc = [0u8; 16];
        size_desc[8..].copy_from_slice(&self.bytes.wrapping_shl(3).to_be_bytes());
        let pad_len = 1 + ((239 - (self.bytes % 128)) % 128) as usize;
        self.write(&PADDING[..pad_len]);
        self.write(&size_desc);
        debug_assert_eq!(self.bytes % BLOCK_SIZE as u64, 0);

        let mut out = [0u8; OUTPUT_SIZE];
        for (chunk, word) in out.chunks_exact_mut(8).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Return to the initial state, dropping any buffered input.
    pub fn reset(&mut self) -> &mut Self {
        self.state = INIT;
        self.bytes = 0;
        self
    }

    /// Total number of bytes absorbed so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl Default for Sha512 {
    fn default() -> Self {
        Self::new()
    }
}
