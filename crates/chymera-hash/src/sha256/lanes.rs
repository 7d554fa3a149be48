//! Lane-generic SHA-256 compression.
//!
//! The round function is written once over [`Lanes`], a vector of independent
//! 32-bit words. `u32` is the one-lane instance used by the portable transform;
//! the SSE4.1 and AVX2 backends instantiate it with 4 and 8 lanes to hash that
//! many unrelated blocks at once.

use super::{read_be32, write_be32, INIT, K};

pub(crate) trait Lanes: Copy {
    /// Number of independent blocks processed together.
    const WIDTH: usize;

    fn splat(value: u32) -> Self;
    fn add(self, other: Self) -> Self;
    fn xor(self, other: Self) -> Self;
    fn and(self, other: Self) -> Self;
    fn or(self, other: Self) -> Self;
    fn shr(self, n: u32) -> Self;
    fn shl(self, n: u32) -> Self;

    #[inline(always)]
    fn rotr(self, n: u32) -> Self {
        self.shr(n).or(self.shl(32 - n))
    }

    /// Big-endian word `word` of each lane's block. Lane `j` reads the block
    /// at `blocks[64 * j..]`.
    fn load_be(blocks: &[u8], word: usize) -> Self;

    /// Store lane `j` big-endian at `out[32 * j + 4 * word..]`.
    fn store_be(self, out: &mut [u8], word: usize);
}

impl Lanes for u32 {
    const WIDTH: usize = 1;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        value
    }
    #[inline(always)]
    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
    #[inline(always)]
    fn xor(self, other: Self) -> Self {
        self ^ other
    }
    #[inline(always)]
    fn and(self, other: Self) -> Self {
        self & other
    }
    #[inline(always)]
    fn or(self, other: Self) -> Self {
        self | other
    }
    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        self >> n
    }
    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        self << n
    }
    #[inline(always)]
    fn rotr(self, n: u32) -> Self {
        self.rotate_right(n)
    }
    #[inline(always)]
    fn load_be(blocks: &[u8], word: usize) -> Self {
        read_be32(blocks, 4 * word)
    }
    #[inline(always)]
    fn store_be(self, out: &mut [u8], word: usize) {
        write_be32(out, 4 * word, self)
    }
}

#[inline(always)]
fn ch<L: Lanes>(x: L, y: L, z: L) -> L {
    z.xor(x.and(y.xor(z)))
}

#[inline(always)]
fn maj<L: Lanes>(x: L, y: L, z: L) -> L {
    x.and(y).or(z.and(x.or(y)))
}

#[inline(always)]
fn big_sigma0<L: Lanes>(x: L) -> L {
    x.rotr(2).xor(x.rotr(13)).xor(x.rotr(22))
}

#[inline(always)]
fn big_sigma1<L: Lanes>(x: L) -> L {
    x.rotr(6).xor(x.rotr(11)).xor(x.rotr(25))
}

#[inline(always)]
fn sigma0<L: Lanes>(x: L) -> L {
    x.rotr(7).xor(x.rotr(18)).xor(x.shr(3))
}

#[inline(always)]
fn sigma1<L: Lanes>(x: L) -> L {
    x.rotr(17).xor(x.rotr(19)).xor(x.shr(10))
}

/// Run the 64 rounds over `w` and add the result into `state`.
///
/// `w` holds the 16 message words on entry and is reused as a ring buffer for
/// the expanded schedule.
#[inline(always)]
pub(crate) fn compress<L: Lanes>(state: &mut [L; 8], w: &mut [L; 16]) {
    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for (i, k) in K.iter().enumerate() {
        if i >= 16 {
            let j = i & 15;
            w[j] = w[j]
                .add(sigma1(w[(i + 14) & 15]))
                .add(w[(i + 9) & 15])
                .add(sigma0(w[(i + 1) & 15]));
        }
        let t1 = h
            .add(big_sigma1(e))
            .add(ch(e, f, g))
            .add(L::splat(*k))
            .add(w[i & 15]);
        let t2 = big_sigma0(a).add(maj(a, b, c));
        h = g;
        g = f;
        f = e;
        e = d.add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.add(t2);
    }

    for (s, v) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *s = s.add(v);
    }
}

/// Double-SHA-256 of `L::WIDTH` consecutive 64-byte blocks into as many
/// consecutive 32-byte digests.
#[inline(always)]
pub(crate) fn double_sha256_64<L: Lanes>(out: &mut [u8], input: &[u8]) {
    debug_assert!(input.len() >= 64 * L::WIDTH);
    debug_assert!(out.len() >= 32 * L::WIDTH);

    let mut state = INIT.map(L::splat);
    let mut w: [L; 16] = core::array::from_fn(|i| L::load_be(input, i));
    compress(&mut state, &mut w);

    // Padding block of a 64-byte message.
    let mut w = [L::splat(0); 16];
    w[0] = L::splat(0x8000_0000);
    w[15] = L::splat(512);
    compress(&mut state, &mut w);

    // Second hash over the 32-byte digest.
    let mut w = [L::splat(0); 16];
    w[..8].copy_from_slice(&state);
    w[8] = L::splat(0x8000_0000);
    w[15] = L::splat(256);
    let mut outer = INIT.map(L::splat);
    compress(&mut outer, &mut w);

    for (i, word) in outer.iter().enumerate() {
        word.store_be(out, i);
    }
}
