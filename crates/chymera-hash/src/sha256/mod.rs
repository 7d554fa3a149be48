//! Incremental SHA-256.
//!
//! The hasher buffers at most one partial block; whole blocks are handed to the
//! engine's transform directly from the caller's slice, several at a time when
//! the input allows it.

pub(crate) mod lanes;
#[cfg(target_arch = "x86_64")]
pub(crate) mod shani;
#[cfg(target_arch = "x86_64")]
pub(crate) mod x86;

use crate::engine::{sha256_engine, Sha256Engine};

/// SHA-256 block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// SHA-256 digest size in bytes.
pub const OUTPUT_SIZE: usize = 32;

/// Initial hash value (FIPS 180-4, 5.3.3).
pub const INIT: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Round constants (FIPS 180-4, 4.2.2).
pub(crate) const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const PADDING: [u8; BLOCK_SIZE] = {
    let mut pad = [0u8; BLOCK_SIZE];
    pad[0] = 0x80;
    pad
};

#[inline(always)]
pub(crate) fn read_be32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline(always)]
pub(crate) fn write_be32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[inline(always)]
fn transform_blocks(state: &mut [u32; 8], blocks: &[u8]) {
    for block in blocks.chunks_exact(BLOCK_SIZE) {
        let mut w: [u32; 16] = core::array::from_fn(|i| read_be32(block, 4 * i));
        lanes::compress(state, &mut w);
    }
}

/// Portable single-block transform: advances `state` over every 64-byte block
/// of `blocks`. Trailing bytes that do not form a whole block are ignored.
pub fn transform(state: &mut [u32; 8], blocks: &[u8]) {
    transform_blocks(state, blocks)
}

/// The portable transform compiled with SSE4.1 code generation enabled.
///
/// # Safety
/// The CPU must support SSE4.1.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
pub(crate) unsafe fn transform_sse41(state: &mut [u32; 8], blocks: &[u8]) {
    transform_blocks(state, blocks)
}

/// Portable double-SHA-256 of one 64-byte block.
pub fn double_sha256_64(out: &mut [u8], input: &[u8]) {
    lanes::double_sha256_64::<u32>(out, input)
}

/// Double-SHA-256 of one 64-byte block built from any single-block transform.
pub(crate) fn double_sha256_64_with(
    transform: fn(&mut [u32; 8], &[u8]),
    out: &mut [u8],
    input: &[u8],
) {
    let mut state = INIT;
    transform(&mut state, &input[..BLOCK_SIZE]);

    // Padding block of a 64-byte message: 0x80, zeros, bit length 512.
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = 0x80;
    block[62] = 0x02;
    transform(&mut state, &block);

    let mut block = [0u8; BLOCK_SIZE];
    for (i, word) in state.iter().enumerate() {
        write_be32(&mut block, 4 * i, *word);
    }
    block[32] = 0x80;
    block[62] = 0x01;
    let mut state = INIT;
    transform(&mut state, &block);
    for (i, word) in state.iter().enumerate() {
        write_be32(out, 4 * i, *word);
    }
}

/// Incremental SHA-256 hasher.
///
/// Holds the engine it was built with, so every block goes through the
/// transform selected for this process (or an explicitly injected one).
#[derive(Clone)]
pub struct Sha256 {
    state: [u32; 8],
    buf: [u8; BLOCK_SIZE],
    bytes: u64,
    engine: &'static Sha256Engine,
}

impl Sha256 {
    /// Create a hasher using the process-wide engine.
    pub fn new() -> Self {
        Self::with_engine(sha256_engine())
    }

    /// Create a hasher that runs its blocks through `engine`.
    pub fn with_engine(engine: &'static Sha256Engine) -> Self {
        Sha256 {
            state: INIT,
            buf: [0u8; BLOCK_SIZE],
            bytes: 0,
            engine,
        }
    }

    /// Absorb `data`.
    ///
    /// A buffered partial block is completed and transformed first, then all
    /// whole blocks are transformed straight from `data` in a single call and
    /// the remainder is buffered.
    pub fn write(&mut self, data: &[u8]) -> &mut Self {
        let mut data = data;
        let mut bufsize = (self.bytes % BLOCK_SIZE as u64) as usize;
        if bufsize != 0 && bufsize + data.len() >= BLOCK_SIZE {
            let fill = BLOCK_SIZE - bufsize;
            self.buf[bufsize..].copy_from_slice(&data[..fill]);
            self.bytes += fill as u64;
            data = &data[fill..];
            self.engine.transform(&mut self.state, &self.buf);
            bufsize = 0;
        }
        let whole = data.len() - data.len() % BLOCK_SIZE;
        if whole > 0 {
            self.engine.transform(&mut self.state, &data[..whole]);
            self.bytes += whole as u64;
            data = &data[whole..];
        }
        if !data.is_empty() {
            self.buf[bufsize..bufsize + data.len()].copy_from_slice(data);
            self.bytes += data.len() as u64;
        }
        self
    }

    /// Pad, append the big-endian bit length and return the digest.
    pub fn finalize(mut self) -> [u8; OUTPUT_SIZE] {
        let bit_len = self.bytes.wrapping_shl(3);
        let pad_len = 1 + ((119 - (self.bytes % 64)) % 64) as usize;
        self.write(&PADDING[..pad_len]);
        self.write(&bit_len.to_be_bytes());
        debug_assert_eq!(self.bytes % BLOCK_SIZE as u64, 0);

        let mut out = [0u8; OUTPUT_SIZE];
        for (i, word) in self.state.iter().enumerate() {
            write_be32(&mut out, 4 * i, *word);
        }
        out
    }

    /// Return to the initial state, keeping the engine.
    pub fn reset(&mut self) -> &mut Self {
        self.state = INIT;
        self.bytes = 0;
        self
    }

    /// Total number of bytes absorbed so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// The engine this hasher compresses with.
    pub fn engine(&self) -> &'static Sha256Engine {
        self.engine
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sha256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256")
            .field("bytes", &self.bytes)
            .field("engine", &self.engine.describe())
            .finish()
    }
}
