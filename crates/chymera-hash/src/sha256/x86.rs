//! SSE4.1 and AVX2 backends.
//!
//! `Sse41x4` and `Avx2x8` are only ever constructed inside the
//! `#[target_feature]` functions below, which the engine installs after
//! detecting the matching CPU features.

use core::arch::x86_64::*;

use super::lanes::{self, Lanes};
use super::{read_be32, transform_sse41, write_be32};

#[derive(Clone, Copy)]
pub(crate) struct Sse41x4(__m128i);

impl Lanes for Sse41x4 {
    const WIDTH: usize = 4;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        // SAFETY: see module docs.
        unsafe { Sse41x4(_mm_set1_epi32(value as i32)) }
    }
    #[inline(always)]
    fn add(self, other: Self) -> Self {
        unsafe { Sse41x4(_mm_add_epi32(self.0, other.0)) }
    }
    #[inline(always)]
    fn xor(self, other: Self) -> Self {
        unsafe { Sse41x4(_mm_xor_si128(self.0, other.0)) }
    }
    #[inline(always)]
    fn and(self, other: Self) -> Self {
        unsafe { Sse41x4(_mm_and_si128(self.0, other.0)) }
    }
    #[inline(always)]
    fn or(self, other: Self) -> Self {
        unsafe { Sse41x4(_mm_or_si128(self.0, other.0)) }
    }
    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        unsafe { Sse41x4(_mm_srl_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }
    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        unsafe { Sse41x4(_mm_sll_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }
    #[inline(always)]
    fn load_be(blocks: &[u8], word: usize) -> Self {
        let at = |lane: usize| read_be32(blocks, 64 * lane + 4 * word) as i32;
        unsafe { Sse41x4(_mm_set_epi32(at(3), at(2), at(1), at(0))) }
    }
    #[inline(always)]
    fn store_be(self, out: &mut [u8], word: usize) {
        let words: [u32; 4] = unsafe { core::mem::transmute(self.0) };
        for (lane, value) in words.iter().enumerate() {
            write_be32(out, 32 * lane + 4 * word, *value);
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Avx2x8(__m256i);

impl Lanes for Avx2x8 {
    const WIDTH: usize = 8;

    #[inline(always)]
    fn splat(value: u32) -> Self {
        unsafe { Avx2x8(_mm256_set1_epi32(value as i32)) }
    }
    #[inline(always)]
    fn add(self, other: Self) -> Self {
        unsafe { Avx2x8(_mm256_add_epi32(self.0, other.0)) }
    }
    #[inline(always)]
    fn xor(self, other: Self) -> Self {
        unsafe { Avx2x8(_mm256_xor_si256(self.0, other.0)) }
    }
    #[inline(always)]
    fn and(self, other: Self) -> Self {
        unsafe { Avx2x8(_mm256_and_si256(self.0, other.0)) }
    }
    #[inline(always)]
    fn or(self, other: Self) -> Self {
        unsafe { Avx2x8(_mm256_or_si256(self.0, other.0)) }
    }
    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        unsafe { Avx2x8(_mm256_srl_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }
    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        unsafe { Avx2x8(_mm256_sll_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }
    #[inline(always)]
    fn load_be(blocks: &[u8], word: usize) -> Self {
        let at = |lane: usize| read_be32(blocks, 64 * lane + 4 * word) as i32;
        unsafe {
            Avx2x8(_mm256_set_epi32(
                at(7),
                at(6),
                at(5),
                at(4),
                at(3),
                at(2),
                at(1),
                at(0),
            ))
        }
    }
    #[inline(always)]
    fn store_be(self, out: &mut [u8], word: usize) {
        let words: [u32; 8] = unsafe { core::mem::transmute(self.0) };
        for (lane, value) in words.iter().enumerate() {
            write_be32(out, 32 * lane + 4 * word, *value);
        }
    }
}

#[target_feature(enable = "sse4.1")]
unsafe fn d64_sse41_4way(out: &mut [u8], input: &[u8]) {
    lanes::double_sha256_64::<Sse41x4>(out, input)
}

#[target_feature(enable = "avx2")]
unsafe fn d64_avx2_8way(out: &mut [u8], input: &[u8]) {
    lanes::double_sha256_64::<Avx2x8>(out, input)
}

/// Installed only when SSE4.1 is present.
pub(crate) fn transform_sse4(state: &mut [u32; 8], blocks: &[u8]) {
    // SAFETY: the engine checks SSE4.1 before selecting this transform.
    unsafe { transform_sse41(state, blocks) }
}

/// Installed only when SSE4.1 is present.
pub(crate) fn double_sha256_64_sse4(out: &mut [u8], input: &[u8]) {
    super::double_sha256_64_with(transform_sse4, out, input)
}

/// Four blocks at once. Installed only when SSE4.1 is present.
pub(crate) fn double_sha256_64_4way(out: &mut [u8], input: &[u8]) {
    assert!(input.len() >= 256 && out.len() >= 128);
    // SAFETY: the engine checks SSE4.1 before selecting this routine.
    unsafe { d64_sse41_4way(out, input) }
}

/// Eight blocks at once. Installed only when AVX2 and AVX are present.
pub(crate) fn double_sha256_64_8way(out: &mut [u8], input: &[u8]) {
    assert!(input.len() >= 512 && out.len() >= 256);
    // SAFETY: the engine checks AVX2 before selecting this routine.
    unsafe { d64_avx2_8way(out, input) }
}
