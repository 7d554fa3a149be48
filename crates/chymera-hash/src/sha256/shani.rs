//! SHA-NI backend: single-block transform and a two-way interleaved
//! double-SHA-256 of 64-byte blocks.
//!
//! The SHA extension keeps the state split as ABEF/CDGH and consumes message
//! words four at a time; `compress` is generic over the number of
//! independent streams so the 1-way and 2-way paths share one round loop.

use core::arch::x86_64::*;

use super::{INIT, K};

#[inline(always)]
unsafe fn byte_swap_mask() -> __m128i {
    _mm_set_epi64x(0x0c0d0e0f08090a0b, 0x0405060700010203)
}

#[inline(always)]
unsafe fn round_constants(quad: usize) -> __m128i {
    _mm_set_epi32(
        K[4 * quad + 3] as i32,
        K[4 * quad + 2] as i32,
        K[4 * quad + 1] as i32,
        K[4 * quad] as i32,
    )
}

/// DCBA/HGFE into ABEF/CDGH.
#[inline(always)]
unsafe fn pack_state(lo: __m128i, hi: __m128i) -> (__m128i, __m128i) {
    let t1 = _mm_shuffle_epi32(lo, 0xB1);
    let t2 = _mm_shuffle_epi32(hi, 0x1B);
    (_mm_alignr_epi8(t1, t2, 8), _mm_blend_epi16(t2, t1, 0xF0))
}

/// ABEF/CDGH back into DCBA/HGFE.
#[inline(always)]
unsafe fn unpack_state(s0: __m128i, s1: __m128i) -> (__m128i, __m128i) {
    let t1 = _mm_shuffle_epi32(s0, 0x1B);
    let t2 = _mm_shuffle_epi32(s1, 0xB1);
    (_mm_blend_epi16(t1, t2, 0xF0), _mm_alignr_epi8(t2, t1, 8))
}

#[inline(always)]
unsafe fn load_message(block: &[u8], mask: __m128i) -> [__m128i; 4] {
    let ptr = block.as_ptr() as *const __m128i;
    [
        _mm_shuffle_epi8(_mm_loadu_si128(ptr), mask),
        _mm_shuffle_epi8(_mm_loadu_si128(ptr.add(1)), mask),
        _mm_shuffle_epi8(_mm_loadu_si128(ptr.add(2)), mask),
        _mm_shuffle_epi8(_mm_loadu_si128(ptr.add(3)), mask),
    ]
}

/// 64 rounds over `N` independent streams, then the feed-forward add.
///
/// `m` holds each stream's message as four vectors of four words and is
/// rewritten in place with the expanded schedule.
#[inline(always)]
unsafe fn compress<const N: usize>(
    s0: &mut [__m128i; N],
    s1: &mut [__m128i; N],
    m: &mut [[__m128i; 4]; N],
) {
    let save0 = *s0;
    let save1 = *s1;

    for quad in 0..16 {
        let k = round_constants(quad);
        let cur = quad % 4;
        let next = (quad + 1) % 4;
        let prev = (quad + 3) % 4;
        for lane in 0..N {
            let msg = _mm_add_epi32(m[lane][cur], k);
            s1[lane] = _mm_sha256rnds2_epu32(s1[lane], s0[lane], msg);
            s0[lane] = _mm_sha256rnds2_epu32(s0[lane], s1[lane], _mm_shuffle_epi32(msg, 0x0E));
            if (3..=14).contains(&quad) {
                let carry = _mm_alignr_epi8(m[lane][cur], m[lane][prev], 4);
                m[lane][next] =
                    _mm_sha256msg2_epu32(_mm_add_epi32(m[lane][next], carry), m[lane][cur]);
            }
            if (1..=12).contains(&quad) {
                m[lane][prev] = _mm_sha256msg1_epu32(m[lane][prev], m[lane][cur]);
            }
        }
    }

    for lane in 0..N {
        s0[lane] = _mm_add_epi32(s0[lane], save0[lane]);
        s1[lane] = _mm_add_epi32(s1[lane], save1[lane]);
    }
}

#[target_feature(enable = "sha,sse2,ssse3,sse4.1")]
unsafe fn transform_shani(state: &mut [u32; 8], blocks: &[u8]) {
    let mask = byte_swap_mask();
    let lo = _mm_loadu_si128(state.as_ptr() as *const __m128i);
    let hi = _mm_loadu_si128(state.as_ptr().add(4) as *const __m128i);
    let (s0, s1) = pack_state(lo, hi);
    let mut s0 = [s0];
    let mut s1 = [s1];

    for block in blocks.chunks_exact(64) {
        let mut m = [load_message(block, mask)];
        compress(&mut s0, &mut s1, &mut m);
    }

    let (lo, hi) = unpack_state(s0[0], s1[0]);
    _mm_storeu_si128(state.as_mut_ptr() as *mut __m128i, lo);
    _mm_storeu_si128(state.as_mut_ptr().add(4) as *mut __m128i, hi);
}

#[target_feature(enable = "sha,sse2,ssse3,sse4.1")]
unsafe fn d64_shani_2way(out: &mut [u8], input: &[u8]) {
    let mask = byte_swap_mask();
    let init_lo = _mm_loadu_si128(INIT.as_ptr() as *const __m128i);
    let init_hi = _mm_loadu_si128(INIT.as_ptr().add(4) as *const __m128i);
    let (i0, i1) = pack_state(init_lo, init_hi);

    // First hash: message block, then the fixed padding block.
    let mut s0 = [i0; 2];
    let mut s1 = [i1; 2];
    let mut m = [
        load_message(&input[..64], mask),
        load_message(&input[64..128], mask),
    ];
    compress(&mut s0, &mut s1, &mut m);

    let pad = [
        _mm_set_epi32(0, 0, 0, 0x8000_0000u32 as i32),
        _mm_setzero_si128(),
        _mm_setzero_si128(),
        _mm_set_epi32(0x200, 0, 0, 0),
    ];
    let mut m = [pad; 2];
    compress(&mut s0, &mut s1, &mut m);

    // Second hash over the 32-byte digests.
    let mut m = [[_mm_setzero_si128(); 4]; 2];
    for lane in 0..2 {
        let (lo, hi) = unpack_state(s0[lane], s1[lane]);
        m[lane] = [
            lo,
            hi,
            _mm_set_epi32(0, 0, 0, 0x8000_0000u32 as i32),
            _mm_set_epi32(0x100, 0, 0, 0),
        ];
    }
    let mut s0 = [i0; 2];
    let mut s1 = [i1; 2];
    compress(&mut s0, &mut s1, &mut m);

    for lane in 0..2 {
        let (lo, hi) = unpack_state(s0[lane], s1[lane]);
        let dst = out[32 * lane..].as_mut_ptr() as *mut __m128i;
        _mm_storeu_si128(dst, _mm_shuffle_epi8(lo, mask));
        _mm_storeu_si128(dst.add(1), _mm_shuffle_epi8(hi, mask));
    }
}

/// Installed only when SHA-NI and SSE4.1 are present.
pub(crate) fn transform(state: &mut [u32; 8], blocks: &[u8]) {
    // SAFETY: the engine checks the SHA and SSE4.1 features before selecting
    // this transform.
    unsafe { transform_shani(state, blocks) }
}

/// Installed only when SHA-NI and SSE4.1 are present.
pub(crate) fn double_sha256_64(out: &mut [u8], input: &[u8]) {
    super::double_sha256_64_with(transform, out, input)
}

/// Two blocks at once. Installed only when SHA-NI and SSE4.1 are present.
pub(crate) fn double_sha256_64_2way(out: &mut [u8], input: &[u8]) {
    assert!(input.len() >= 128 && out.len() >= 64);
    // SAFETY: see `transform`; lengths checked above.
    unsafe { d64_shani_2way(out, input) }
}
